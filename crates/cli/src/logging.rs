use anyhow::Result;
use std::path::PathBuf;
use tracing::Level;
use upsell_core::tracing::{InstrumentationConfig, init_tracing};

/// Initialize logging for the CLI
///
/// An explicit `--log-level` wins over the configured default; `RUST_LOG`
/// still wins over both.
pub fn init_logging(
    level: Option<Level>,
    default_filter: &str,
    log_file: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let log_level = match level {
        Some(level) => filter_for(level),
        None => default_filter.to_string(),
    };

    let env = InstrumentationConfig::from_env();
    let config = InstrumentationConfig {
        service_name: "upsell-cli".to_string(),
        log_level,
        json: json || env.json,
        log_file: log_file.or(env.log_file),
        ..env
    };

    init_tracing(&config)?;
    Ok(())
}

fn filter_for(level: Level) -> String {
    let level = level.as_str().to_lowercase();
    format!("upsell={level},upsell_session={level},upsell_http={level},upsell_core={level}")
}
