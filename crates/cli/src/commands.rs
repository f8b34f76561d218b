//! CLI commands

use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, TimeZone, Utc};
use clap::{Args, Subcommand};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};
use upsell_http::ApiClient;
use upsell_http::types::Credentials;
use upsell_session::services::{AnalyticsService, DateRange};
use upsell_session::storage::FileStorage;
use upsell_session::{SessionClient, SessionConfig, TokenStore, global, jwt};

use crate::settings::Settings;

#[derive(Subcommand)]
pub enum Commands {
    /// Log in with email and password
    Login {
        /// Account email
        #[arg(long, env = "UPSELL_EMAIL")]
        email: String,

        /// Account password
        #[arg(long, env = "UPSELL_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Show the current session
    Status,

    /// Ask the auth service whether the access token is still accepted
    Verify,

    /// Rotate the token pair now
    Refresh,

    /// End the session locally and on the server
    Logout,

    /// List locations visible to the current user
    Locations,

    /// Conversion and revenue metrics for a location
    Metrics {
        location: String,
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Runs recorded at a location
    Runs { location: String },

    /// Metrics for a single run
    Run { run_id: String },

    /// Transaction drill-down of a run
    Transactions {
        run_id: String,
        #[arg(long, default_value = "1")]
        page: u32,
    },

    /// Operator leaderboard for a location
    Leaderboard {
        location: String,
        #[command(flatten)]
        range: RangeArgs,
    },

    /// GET any backend path through the authorized gateway
    Get {
        /// Path below the API base URL, e.g. /api/locations
        path: String,
    },
}

/// Reporting window: `--days N` back from today, or explicit bounds
#[derive(Args, Debug, Clone)]
pub struct RangeArgs {
    #[arg(long, default_value = "30", conflicts_with_all = ["start", "end"])]
    days: u64,

    #[arg(long, requires = "end")]
    start: Option<NaiveDate>,

    #[arg(long, requires = "start")]
    end: Option<NaiveDate>,
}

impl RangeArgs {
    fn resolve(&self) -> DateRange {
        match (self.start, self.end) {
            (Some(start), Some(end)) => DateRange::new(start, end),
            _ => DateRange::last_days(Utc::now().date_naive(), self.days),
        }
    }
}

#[derive(Serialize)]
struct Status<'a> {
    state: String,
    authenticated: bool,
    user: Option<&'a upsell_http::types::User>,
    access_token_expires_at: Option<String>,
    session_file: String,
}

impl Commands {
    pub async fn execute(self, settings: Settings) -> Result<()> {
        let session_file = settings.session_file();
        let session = open_session(&settings)?;

        // Login and logout act on the stored tokens directly
        if !matches!(self, Commands::Login { .. } | Commands::Logout) {
            let snapshot = session.initialize().await;
            debug!(state = ?snapshot.state, "Session initialized");
        }

        let analytics = || {
            global::gateway()
                .map(AnalyticsService::new)
                .context("Session is not installed")
        };

        match self {
            Commands::Login { email, password } => {
                let user = session.login(&Credentials::new(email, password)).await?;
                info!(user = %user.id, "Session stored at {}", session_file.display());
                print_json(&user)
            }
            Commands::Status => {
                let snapshot = session.snapshot();
                let expires_at = session
                    .access_token()
                    .and_then(|token| jwt::decode_token(&token))
                    .and_then(|claims| claims.expires_at_ms())
                    .and_then(|ms| Utc.timestamp_millis_opt(ms as i64).single())
                    .map(|at| at.to_rfc3339());
                print_json(&Status {
                    state: format!("{:?}", snapshot.state),
                    authenticated: snapshot.is_authenticated(),
                    user: snapshot.user.as_ref(),
                    access_token_expires_at: expires_at,
                    session_file: session_file.display().to_string(),
                })
            }
            Commands::Verify => {
                let valid = session.verify().await?;
                println!("{}", if valid { "valid" } else { "invalid" });
                if !valid {
                    bail!("Access token was not accepted");
                }
                Ok(())
            }
            Commands::Refresh => {
                require_session(&session)?;
                session.refresh_token().await?;
                println!("Token pair refreshed");
                Ok(())
            }
            Commands::Logout => {
                session.logout().await;
                println!("Logged out");
                Ok(())
            }
            Commands::Locations => {
                require_session(&session)?;
                print_json(&analytics()?.locations().await?)
            }
            Commands::Metrics { location, range } => {
                require_session(&session)?;
                let metrics = analytics()?
                    .location_metrics(&location, &range.resolve())
                    .await?;
                print_json(&metrics)
            }
            Commands::Runs { location } => {
                require_session(&session)?;
                print_json(&analytics()?.runs(&location).await?)
            }
            Commands::Run { run_id } => {
                require_session(&session)?;
                print_json(&analytics()?.run(&run_id).await?)
            }
            Commands::Transactions { run_id, page } => {
                require_session(&session)?;
                print_json(&analytics()?.run_transactions(&run_id, page).await?)
            }
            Commands::Leaderboard { location, range } => {
                require_session(&session)?;
                let leaderboard = analytics()?
                    .leaderboard(&location, &range.resolve())
                    .await?;
                print_json(&leaderboard)
            }
            Commands::Get { path } => {
                let gateway = global::gateway().context("Session is not installed")?;
                let body: serde_json::Value = gateway.get(&path).await?;
                print_json(&body)
            }
        }
    }
}

/// Build the session over the file-backed store and install it process-wide
fn open_session(settings: &Settings) -> Result<SessionClient> {
    let api = ApiClient::builder()
        .base_url(settings.api.base_url.clone())
        .timeout(settings.timeout())
        .build()
        .context("Failed to build API client")?;

    let store = TokenStore::new(Arc::new(FileStorage::new(settings.session_file())));
    let session = SessionClient::builder(api)
        .token_store(store)
        .config(SessionConfig {
            proactive_refresh: settings.session.proactive_refresh,
            ..SessionConfig::default()
        })
        .build();

    if global::install(session.clone()).is_err() {
        bail!("A session is already installed");
    }
    Ok(session)
}

fn require_session(session: &SessionClient) -> Result<()> {
    if !session.snapshot().is_authenticated() {
        bail!("Not logged in; run `upsell login` first");
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
