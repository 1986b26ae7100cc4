//! Portico HTTP client

pub mod auth;
pub mod error;

use error::ClientError;
use portico_core::SessionStore;
use reqwest::{Client, ClientBuilder, StatusCode, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("portico-client/", env!("CARGO_PKG_VERSION"));

/// Backend API client.
///
/// When bound to a [`SessionStore`], every request carries the session's
/// bearer token, and a 401 answer to such a request ends the session.
/// No retries or backoff.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Option<SessionStore>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("has_session", &self.session.is_some())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client without a session
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new client builder
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Same HTTP client bound to a session store
    #[must_use]
    pub fn with_session(&self, session: SessionStore) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            session: Some(session),
        }
    }

    /// Create a request builder, authenticated if the session holds a token
    pub fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let token = self.session.as_ref().and_then(SessionStore::access_token);
        match token {
            Some(token) => self.request_with_token(method, path, &token),
            None => self.client.request(method, self.url(path)),
        }
    }

    /// Create a request builder carrying an explicit bearer token
    pub fn request_with_token(
        &self,
        method: reqwest::Method,
        path: &str,
        token: &str,
    ) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
    }

    /// Execute a request and decode a JSON response
    pub async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = self.send(request).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Execute a request whose response body is ignored
    pub async fn execute_empty(&self, request: reqwest::RequestBuilder) -> Result<(), ClientError> {
        self.send(request).await.map(|_| ())
    }

    /// `GET` a JSON resource
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.execute(self.request(reqwest::Method::GET, path)).await
    }

    /// `POST` a JSON body and decode the JSON response
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        self.execute(self.request(reqwest::Method::POST, path).json(body))
            .await
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ClientError> {
        let request = request.build()?;
        let authenticated = request.headers().contains_key(header::AUTHORIZATION);
        debug!(method = %request.method(), url = %request.url(), authenticated, "Sending request");

        let response = self.client.execute(request).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let error = ClientError::from_status(status, &body);

        if status == StatusCode::UNAUTHORIZED && authenticated {
            if let Some(session) = &self.session {
                warn!("Backend rejected the session token, signing out");
                session.sign_out().await;
            }
        }
        Err(error)
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

/// Builder for [`ApiClient`]
#[derive(Default)]
pub struct ApiClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    session: Option<SessionStore>,
}

impl ApiClientBuilder {
    /// Set the base URL
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Attach bearer tokens from this session
    #[must_use]
    pub fn session(mut self, session: SessionStore) -> Self {
        self.session = Some(session);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<ApiClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;

        let parsed = url::Url::parse(&base_url)
            .map_err(|e| ClientError::Configuration(format!("invalid base_url '{base_url}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::Configuration(format!(
                "base_url must be http or https, got '{}'",
                parsed.scheme()
            )));
        }

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        let mut client_builder = ClientBuilder::new()
            .user_agent(self.user_agent.unwrap_or_else(|| USER_AGENT.to_string()));
        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        Ok(ApiClient {
            client: client_builder.build()?,
            base_url,
            session: self.session,
        })
    }
}
