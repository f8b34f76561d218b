//! Upsell CLI - session-aware client for the analytics dashboard API

mod commands;
mod logging;
mod settings;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use commands::Commands;
use settings::Settings;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{Level, error, info};
use upsell_http::ClientError;

#[derive(Parser)]
#[command(name = "upsell")]
#[command(about = "Query the upsell analytics dashboard API")]
#[command(version)]
struct Cli {
    /// Set logging level (defaults to the configured `log_level`)
    #[arg(short = 'l', long, global = true)]
    log_level: Option<LogLevel>,

    /// Configuration file (TOML or YAML)
    #[arg(short = 'c', long, global = true, env = "UPSELL_CONFIG")]
    config: Option<PathBuf>,

    /// Timeout for the whole command in seconds (0 = no timeout)
    #[arg(short = 't', long, global = true, default_value = "60")]
    timeout: u64,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    logging::init_logging(
        cli.log_level.map(Into::into),
        &settings.log_level,
        cli.log_file.clone(),
        cli.json_logs,
    )?;

    info!(base_url = %settings.api.base_url, "Starting upsell CLI");

    let result = if cli.timeout == 0 {
        cli.command.execute(settings).await
    } else {
        let timeout_duration = Duration::from_secs(cli.timeout);
        match tokio::time::timeout(timeout_duration, cli.command.execute(settings)).await {
            Ok(result) => result,
            Err(_) => {
                error!("Command timed out after {} seconds", cli.timeout);
                std::process::exit(1);
            }
        }
    };

    if let Err(e) = result {
        match e.downcast_ref::<ClientError>() {
            Some(err) => error!(status = ?err.status(), "{}", failure_message(&e)),
            None => error!("{}", failure_message(&e)),
        }
        std::process::exit(1);
    }

    Ok(())
}

/// Error line for a failed command, pointing at `login` when the session is gone
fn failure_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<ClientError>() {
        Some(client_err) if client_err.is_auth_expired() => {
            format!("Command failed: {err:#}; run `upsell login` to start a new session")
        }
        _ => format!("Command failed: {err:#}"),
    }
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
