//! Configuration for Portico front ends

use crate::apps::AppKind;
use crate::error::{CoreError, CoreResult};
use crate::monitor::MonitorConfig;
use crate::routing::RouteGuard;
use crate::storage::AUTH_TOKEN_KEY;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PorticoConfig {
    /// Which dashboard application to run
    pub app: AppKind,

    /// Session and inactivity settings
    pub auth: AuthSettings,

    /// Backend API settings
    pub api: ApiSettings,

    /// Route protection settings
    pub routes: RouteSettings,

    /// Directory for persisted session data and logs
    pub data_dir: PathBuf,
}

/// Session and inactivity settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    /// Inactivity after which the session is ended
    pub inactivity_timeout_secs: u64,

    /// How long before the timeout to warn
    pub warning_lead_secs: u64,

    /// Minimum spacing between activity-triggered resets
    pub activity_debounce_ms: u64,

    /// Storage slot for the access token
    pub token_key: String,
}

/// Backend API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL of the backend
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Route protection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSettings {
    /// Unauthenticated landing location
    pub landing: String,

    /// Location of the role-selected dashboard
    pub dashboard: String,

    /// Path prefixes requiring a session
    pub protected: Vec<String>,
}

impl Default for PorticoConfig {
    fn default() -> Self {
        Self {
            app: AppKind::default(),
            auth: AuthSettings::default(),
            api: ApiSettings::default(),
            routes: RouteSettings::default(),
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("portico"),
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        let monitor = MonitorConfig::default();
        Self {
            inactivity_timeout_secs: monitor.timeout.as_secs(),
            warning_lead_secs: monitor.warning_lead.as_secs(),
            activity_debounce_ms: u64::try_from(monitor.activity_debounce.as_millis())
                .unwrap_or(u64::MAX),
            token_key: AUTH_TOKEN_KEY.to_string(),
        }
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for RouteSettings {
    fn default() -> Self {
        let guard = RouteGuard::default();
        Self {
            landing: guard.landing().to_string(),
            dashboard: "/dashboard".to_string(),
            protected: guard.protected_prefixes().to_vec(),
        }
    }
}

impl PorticoConfig {
    /// Load configuration from defaults, an optional file and `PORTICO__*`
    /// environment variables, in increasing precedence
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a value fails to parse
    pub fn load(path: Option<&Path>) -> CoreResult<Self> {
        let defaults = Self::default();

        let mut builder = config::Config::builder()
            .set_default("app", defaults.app.as_str())?
            .set_default(
                "auth.inactivity_timeout_secs",
                defaults.auth.inactivity_timeout_secs,
            )?
            .set_default("auth.warning_lead_secs", defaults.auth.warning_lead_secs)?
            .set_default(
                "auth.activity_debounce_ms",
                defaults.auth.activity_debounce_ms,
            )?
            .set_default("auth.token_key", defaults.auth.token_key)?
            .set_default("api.base_url", defaults.api.base_url)?
            .set_default("api.timeout_secs", defaults.api.timeout_secs)?
            .set_default("routes.landing", defaults.routes.landing)?
            .set_default("routes.dashboard", defaults.routes.dashboard)?
            .set_default("routes.protected", defaults.routes.protected)?
            .set_default("data_dir", defaults.data_dir.to_string_lossy().to_string())?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("PORTICO")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("routes.protected")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> CoreResult<()> {
        self.monitor_config()?;
        if self.api.base_url.trim().is_empty() {
            return Err(CoreError::invalid_config("api.base_url must not be empty"));
        }
        if !self.route_guard().is_protected(&self.routes.dashboard) {
            return Err(CoreError::invalid_config(format!(
                "dashboard '{}' is not covered by any protected prefix",
                self.routes.dashboard
            )));
        }
        Ok(())
    }

    pub fn monitor_config(&self) -> CoreResult<MonitorConfig> {
        MonitorConfig::new(
            Duration::from_secs(self.auth.inactivity_timeout_secs),
            Duration::from_secs(self.auth.warning_lead_secs),
        )
        .map(|config| {
            config.with_activity_debounce(Duration::from_millis(self.auth.activity_debounce_ms))
        })
    }

    pub fn route_guard(&self) -> RouteGuard {
        RouteGuard::new(&self.routes.landing, &self.routes.protected)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    /// File holding the persisted token slots
    pub fn session_file(&self) -> PathBuf {
        self.data_dir.join("session.json")
    }
}
