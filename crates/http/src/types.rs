//! Wire types of the auth endpoints

use portico_core::{AuthGrant, Identity};
use serde::{Deserialize, Serialize};

/// `POST /auth/signin` body
#[derive(Debug, Serialize, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Response of `/auth/signin` and `/auth/refresh`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Profile returned next to the token, if the backend sends one
    #[serde(default, alias = "identity")]
    pub user: Option<Identity>,
}

impl From<TokenResponse> for AuthGrant {
    fn from(response: TokenResponse) -> Self {
        Self {
            access_token: response.access_token,
            identity: response.user,
        }
    }
}

/// Error body shapes seen from auth backends
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    pub message: Option<String>,
    pub error_description: Option<String>,
    pub error: Option<String>,
    pub detail: Option<String>,
}

impl ErrorBody {
    /// The most specific human-readable message in a response body, falling
    /// back to the raw text
    pub fn message_from(body: &str) -> String {
        serde_json::from_str::<Self>(body)
            .ok()
            .and_then(|parsed| {
                parsed
                    .message
                    .or(parsed.error_description)
                    .or(parsed.detail)
                    .or(parsed.error)
            })
            .unwrap_or_else(|| body.trim().to_string())
    }
}
