//! Portico CLI - sign in to and navigate the role-based dashboards

mod commands;
mod logging;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use commands::Commands;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{Level, debug, error};

#[derive(Parser)]
#[command(name = "portico")]
#[command(about = "Session, inactivity and role-based dashboards for the Portico applications")]
#[command(version)]
struct Cli {
    /// Set logging level
    #[arg(short = 'l', long, global = true, default_value = "warn")]
    log_level: LogLevel,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(short = 'c', long, global = true, env = "PORTICO_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for the persisted session and logs
    #[arg(short = 'd', long, global = true)]
    data_dir: Option<PathBuf>,

    /// Timeout for operations in seconds (0 = no timeout). Ignored by `watch`.
    #[arg(short = 't', long, global = true, default_value = "30")]
    timeout: u64,

    /// Disable file logging (only log to stderr)
    #[arg(long, global = true)]
    no_file_log: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let cli_data_dir = cli.data_dir.clone();
    let data_dir = logging::resolve_data_dir(cli.data_dir);
    logging::init_logging(cli.log_level.into(), &data_dir, cli.no_file_log)?;

    debug!(data_dir = %data_dir.display(), "Starting Portico CLI");

    let timeout = if cli.command.is_long_running() {
        0
    } else {
        cli.timeout
    };
    let run = cli.command.execute(cli.config, cli_data_dir);

    if timeout == 0 {
        if let Err(e) = run.await {
            error!("Command failed: {e:#}");
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    } else {
        match tokio::time::timeout(Duration::from_secs(timeout), run).await {
            Ok(Ok(())) => {
                debug!("Command completed successfully");
            }
            Ok(Err(e)) => {
                error!("Command failed: {e:#}");
                eprintln!("Error: {e:#}");
                std::process::exit(1);
            }
            Err(_) => {
                error!("Command timed out after {timeout} seconds");
                eprintln!("Error: timed out after {timeout} seconds");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

#[derive(Clone, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}
