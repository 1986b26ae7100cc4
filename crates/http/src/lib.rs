//! Portico HTTP layer: a thin API client that forwards requests to the
//! backend with the session's bearer token, and the REST implementation of
//! the auth backend.

pub mod client;
pub mod types;

pub use client::auth::HttpAuthBackend;
pub use client::error::ClientError;
pub use client::{ApiClient, ApiClientBuilder};
