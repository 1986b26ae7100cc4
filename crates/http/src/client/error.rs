//! Client error types

use crate::types::ErrorBody;
use portico_core::BackendError;
use thiserror::Error;

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or request error
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server returned an error status
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Create error from HTTP status code and response body
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = if body.trim().is_empty() {
            status.to_string()
        } else {
            ErrorBody::message_from(body)
        };
        match status.as_u16() {
            400 | 422 => Self::BadRequest(message),
            401 => Self::AuthenticationFailed(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            status => Self::ServerError { status, message },
        }
    }

    /// Whether the server rejected the session's token
    pub const fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_))
    }
}

impl From<ClientError> for BackendError {
    /// 4xx answers are rejections; everything else means the backend could
    /// not be used
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::AuthenticationFailed(message)
            | ClientError::BadRequest(message)
            | ClientError::Forbidden(message)
            | ClientError::NotFound(message) => Self::Rejected(message),
            ClientError::ServerError { status, message } if (400..500).contains(&status) => {
                Self::Rejected(message)
            }
            other => Self::Unavailable(other.to_string()),
        }
    }
}
