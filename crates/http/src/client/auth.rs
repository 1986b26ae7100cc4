//! REST implementation of the auth backend

use super::{ApiClient, ClientError};
use crate::types::{SignInRequest, TokenResponse};
use async_trait::async_trait;
use portico_core::{AuthBackend, AuthGrant, BackendError, Credentials};
use tracing::debug;

/// Auth backend speaking JSON over HTTP:
///
/// - `POST /auth/signin` with `{email, password}`
/// - `POST /auth/refresh` with the current bearer token
/// - `POST /auth/signout` with the bearer token to revoke
#[derive(Debug, Clone)]
pub struct HttpAuthBackend {
    client: ApiClient,
}

impl HttpAuthBackend {
    /// Wrap a client. Only its base URL and HTTP settings are used; tokens
    /// are passed explicitly per call.
    pub const fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn from_base_url(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Ok(Self::new(ApiClient::new(base_url)?))
    }
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthGrant, BackendError> {
        debug!(email = %credentials.email, "Requesting sign-in");
        let request = self
            .client
            .request(reqwest::Method::POST, "/auth/signin")
            .json(&SignInRequest {
                email: credentials.email.clone(),
                password: credentials.password.clone(),
            });
        let response: TokenResponse = self.client.execute(request).await?;
        Ok(response.into())
    }

    async fn refresh_session(&self, access_token: &str) -> Result<AuthGrant, BackendError> {
        let request =
            self.client
                .request_with_token(reqwest::Method::POST, "/auth/refresh", access_token);
        let response: TokenResponse = self.client.execute(request).await?;
        Ok(response.into())
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        let request =
            self.client
                .request_with_token(reqwest::Method::POST, "/auth/signout", access_token);
        self.client.execute_empty(request).await?;
        Ok(())
    }
}
