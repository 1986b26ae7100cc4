//! Auth backend collaborator interface

use crate::identity::{Credentials, Identity};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Successful sign-in or refresh response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthGrant {
    pub access_token: String,
    /// Identity returned alongside the token, used when the token itself
    /// carries no profile metadata
    #[serde(default)]
    pub identity: Option<Identity>,
}

/// Failure reported by an auth backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The backend answered and refused the request
    #[error("{0}")]
    Rejected(String),

    /// The request could not complete
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// External authentication service
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Exchange credentials for an access token
    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthGrant, BackendError>;

    /// Exchange a live access token for a fresh one
    async fn refresh_session(&self, access_token: &str) -> Result<AuthGrant, BackendError>;

    /// Revoke an access token
    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError>;
}
