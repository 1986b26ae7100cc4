//! Common error handling utilities and conventions

/// Extension trait for adding context to errors consistently across crates
pub trait ErrorContext<T> {
    /// Add operation context to an error result
    fn with_context<F>(self, f: F) -> Result<T, String>
    where
        F: FnOnce() -> String;

    /// Add operation context with a static string
    fn with_context_str(self, context: &'static str) -> Result<T, String>;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: std::fmt::Display,
{
    fn with_context<F>(self, f: F) -> Result<T, String>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|err| format!("{}: {}", f(), err))
    }

    fn with_context_str(self, context: &'static str) -> Result<T, String> {
        self.with_context(|| context.to_string())
    }
}

/// Standard result type for core operations
pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Result type for session operations
pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Infrastructure errors: configuration, storage and serialization
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("IO operation failed: {message}")]
    Io { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl CoreError {
    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an IO error
    pub fn io_error(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization_error(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        Self::io_error(err.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_error(err.to_string())
    }
}

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        Self::invalid_config(err.to_string())
    }
}

/// Errors surfaced by the session store.
///
/// Backend failures are classified here; route guards and dispatchers only
/// ever see the derived session state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Bad credentials. Shown inline, session state untouched.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Refresh failed, token expired or the inactivity timeout fired.
    #[error("Session expired")]
    SessionExpired,

    /// The request could not complete. Retryable, session state untouched.
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    /// Another sign-in attempt is still in flight.
    #[error("A sign-in attempt is already in progress")]
    SignInInProgress,

    /// The access token could not be decoded into an identity.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Persisted token storage failed.
    #[error("Token storage error: {0}")]
    Storage(String),
}

impl SessionError {
    /// Text suitable for showing to the user next to the form or as a toast
    pub fn user_message(&self) -> String {
        match self {
            Self::AuthenticationFailed(message) => message.clone(),
            Self::SessionExpired => "Your session has expired. Please sign in again.".to_string(),
            Self::NetworkUnavailable(_) => {
                "Unable to reach the server. Please try again.".to_string()
            }
            Self::SignInInProgress => "Sign-in is already in progress.".to_string(),
            Self::InvalidToken(_) => "Your session is invalid. Please sign in again.".to_string(),
            Self::Storage(_) => "Unable to access saved session data.".to_string(),
        }
    }

    /// Whether retrying the same call may succeed
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkUnavailable(_) | Self::SignInInProgress)
    }
}

impl From<CoreError> for SessionError {
    fn from(err: CoreError) -> Self {
        Self::Storage(err.to_string())
    }
}
