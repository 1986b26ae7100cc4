//! CLI commands

use anyhow::{Context as _, Result, bail};
use async_trait::async_trait;
use clap::Subcommand;
use portico_core::apps::{EmergencyRole, EnergyMonitorRole, EnergyPredictRole};
use portico_core::{
    AppKind, Credentials, DashboardView, FileTokenStorage, InactivityMonitor, MonitorListener,
    Navigation, Navigator, PorticoConfig, Rendered, RoleSet, SessionState, SessionStore,
    SignOutOnExpire, TokenStorage,
};
use portico_http::{ApiClient, HttpAuthBackend};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

/// Storage slot remembering the location a sign-in should return to
const RETURN_TO_KEY: &str = "return_to";

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in with email and password
    Login {
        /// Account email
        #[arg(long)]
        email: String,

        /// Account password
        #[arg(long, env = "PORTICO_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// End the current session
    Logout,

    /// Show the signed-in identity
    Whoami {
        /// Print the identity as JSON
        #[arg(long)]
        json: bool,
    },

    /// Navigate to a location and show what would be rendered
    Open {
        /// Location, e.g. /dashboard
        path: String,
    },

    /// Exchange the access token for a fresh one
    Refresh,

    /// Fetch a JSON resource from the backend with the session token
    Get {
        /// Resource path relative to the API base URL
        path: String,
    },

    /// Keep the session open and sign out after inactivity. Each line read
    /// from stdin counts as activity.
    Watch,

    /// Configuration operations
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write the default configuration as TOML
    Init {
        /// Output file path (defaults to <data dir>/portico.toml)
        output: Option<PathBuf>,
    },

    /// Print the effective configuration
    Show,
}

impl Commands {
    /// Commands that run until interrupted rather than to completion
    pub const fn is_long_running(&self) -> bool {
        matches!(self, Self::Watch)
    }

    pub async fn execute(self, config_file: Option<PathBuf>, data_dir: Option<PathBuf>) -> Result<()> {
        let mut config = PorticoConfig::load(config_file.as_deref())
            .context("Failed to load configuration")?;
        if let Some(data_dir) = data_dir {
            config.data_dir = data_dir;
        }

        if let Self::Config { command } = self {
            return command.execute(&config);
        }

        let ctx = Context::open(config).await?;
        match self {
            Self::Login { email, password } => login(&ctx, &email, &password).await,
            Self::Logout => logout(&ctx).await,
            Self::Whoami { json } => whoami(&ctx, json),
            Self::Open { path } => open(&ctx, &path).await,
            Self::Refresh => refresh(&ctx).await,
            Self::Get { path } => get(&ctx, &path).await,
            Self::Watch => watch(&ctx).await,
            Self::Config { .. } => unreachable!("handled above"),
        }
    }
}

impl ConfigCommands {
    pub fn execute(self, config: &PorticoConfig) -> Result<()> {
        match self {
            Self::Init { output } => {
                let path = output.unwrap_or_else(|| config.data_dir.join("portico.toml"));
                write_default_config(&path)?;
                println!("Generated configuration at: {}", path.display());
                Ok(())
            }
            Self::Show => {
                print!("{}", toml::to_string_pretty(config)?);
                Ok(())
            }
        }
    }
}

fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(&PorticoConfig::default())?)?;
    Ok(())
}

/// Resolved configuration and a session restored from disk
struct Context {
    config: PorticoConfig,
    store: SessionStore,
    storage: Arc<FileTokenStorage>,
}

impl Context {
    async fn open(config: PorticoConfig) -> Result<Self> {
        let client = ApiClient::builder()
            .base_url(&config.api.base_url)
            .timeout(config.request_timeout())
            .build()?;
        let storage = Arc::new(FileTokenStorage::new(config.session_file()));
        let store = SessionStore::with_token_key(
            Arc::new(HttpAuthBackend::new(client)),
            storage.clone(),
            &config.auth.token_key,
        );

        let state = store.initialize().await;
        debug!(phase = state.phase(), session_file = %storage.path().display(), "Session initialized");

        Ok(Self {
            config,
            store,
            storage,
        })
    }

    fn require_session(&self) -> Result<()> {
        if !self.store.is_authenticated() {
            bail!("Not signed in. Run `portico login` first.");
        }
        Ok(())
    }
}

async fn login(ctx: &Context, email: &str, password: &str) -> Result<()> {
    let identity = ctx
        .store
        .sign_in(&Credentials::new(email, password))
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    let next = ctx
        .storage
        .get(RETURN_TO_KEY)
        .await?
        .unwrap_or_else(|| ctx.config.routes.dashboard.clone());
    ctx.storage.remove(RETURN_TO_KEY).await?;

    println!("Signed in as {} ({})", identity.name, identity.role);
    println!("Continue at {next}");
    Ok(())
}

async fn logout(ctx: &Context) -> Result<()> {
    let was_signed_in = ctx.store.is_authenticated();
    ctx.store.sign_out().await;
    if was_signed_in {
        println!("Signed out");
    } else {
        println!("No active session");
    }
    Ok(())
}

fn whoami(ctx: &Context, json: bool) -> Result<()> {
    let SessionState::Authenticated { identity, session } = ctx.store.state() else {
        println!("Not signed in");
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&identity)?);
        return Ok(());
    }

    println!("{} <{}>", identity.name, identity.email);
    println!("  role:   {}", identity.role);
    println!("  status: {:?}", identity.status);
    if let Some(phone) = &identity.phone {
        println!("  phone:  {phone}");
    }
    for (key, value) in &identity.attributes {
        match value {
            Value::String(s) => println!("  {key}: {s}"),
            other => println!("  {key}: {other}"),
        }
    }
    if let Some(expires_at) = session.expires_at {
        println!("  session expires {}", expires_at.to_rfc3339());
    }
    Ok(())
}

async fn open(ctx: &Context, path: &str) -> Result<()> {
    match ctx.config.app {
        AppKind::Emergency => open_in::<EmergencyRole>(ctx, path).await,
        AppKind::EnergyMonitor => open_in::<EnergyMonitorRole>(ctx, path).await,
        AppKind::EnergyPredict => open_in::<EnergyPredictRole>(ctx, path).await,
    }
}

async fn open_in<R: RoleSet>(ctx: &Context, path: &str) -> Result<()> {
    let navigator = Navigator::<R>::new(
        ctx.config.route_guard(),
        ctx.store.clone(),
        &ctx.config.routes.dashboard,
    );

    match navigator.navigate(path).await {
        Navigation::Loading => println!("Loading..."),
        Navigation::Redirect { to, return_to } => {
            ctx.storage.set(RETURN_TO_KEY, &return_to).await?;
            println!("Sign-in required, redirected to {to}");
        }
        Navigation::Page { path } => println!("Showing {path}"),
        Navigation::Dashboard(Rendered::View(view)) => {
            println!("{}", view.title());
            for section in view.sections() {
                println!("  - {section}");
            }
        }
        Navigation::Dashboard(Rendered::Fallback { message, .. }) => println!("{message}"),
    }
    Ok(())
}

async fn refresh(ctx: &Context) -> Result<()> {
    ctx.require_session()?;
    let identity = ctx
        .store
        .refresh_session()
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    println!("Session refreshed for {}", identity.name);
    Ok(())
}

async fn get(ctx: &Context, path: &str) -> Result<()> {
    ctx.require_session()?;
    let client = ApiClient::builder()
        .base_url(&ctx.config.api.base_url)
        .timeout(ctx.config.request_timeout())
        .session(ctx.store.clone())
        .build()?;

    let body: Value = client.get_json(path).await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

/// Prints inactivity warnings to the terminal
struct TerminalNotice;

#[async_trait]
impl MonitorListener for TerminalNotice {
    async fn on_warning(&self, remaining: Duration) {
        println!(
            "Your session will end in {}s due to inactivity. Press Enter to stay signed in.",
            remaining.as_secs()
        );
    }

    async fn on_expire(&self) {
        println!("Signed out due to inactivity");
    }
}

async fn watch(ctx: &Context) -> Result<()> {
    ctx.require_session()?;

    let monitor = InactivityMonitor::new(ctx.config.monitor_config()?)?;
    let _notice = monitor.subscribe(Arc::new(TerminalNotice));
    let _expiry = monitor.subscribe(Arc::new(SignOutOnExpire::new(ctx.store.clone())));
    monitor.start();
    info!(
        timeout_secs = monitor.config().timeout.as_secs(),
        "Watching session for inactivity"
    );
    println!("Watching session. Press Enter to register activity, Ctrl-C to stop.");

    let mut state = ctx.store.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => match line? {
                Some(_) => {
                    if monitor.record_activity() {
                        debug!("Activity recorded");
                    }
                }
                None => stdin_open = false,
            },
            changed = state.changed() => {
                changed?;
                if !state.borrow_and_update().is_authenticated() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Stopped watching; the session stays open");
                break;
            }
        }
    }

    monitor.shutdown().await;
    Ok(())
}
