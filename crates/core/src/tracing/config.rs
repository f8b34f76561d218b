//! Configuration for tracing and instrumentation

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main instrumentation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentationConfig {
    /// Service name attached to the startup event
    pub service_name: String,
    /// Service version
    pub service_version: String,
    /// Log level filter (e.g., "info", "debug", "upsell_session=trace")
    pub log_level: String,
    /// Emit JSON lines instead of human readable output
    #[serde(default)]
    pub json: bool,
    /// Optional file that receives a copy of every event (no ANSI colors)
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        Self {
            service_name: "upsell".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "info".to_string(),
            json: false,
            log_file: None,
        }
    }
}

impl InstrumentationConfig {
    /// Create configuration from environment variables
    ///
    /// Supports the following environment variables:
    /// - `SERVICE_NAME`: Service name
    /// - `RUST_LOG`: Log level filter
    /// - `UPSELL_LOG_JSON`: `1` or `true` switches to JSON output
    /// - `UPSELL_LOG_FILE`: path of an additional log file
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let service_name = std::env::var("SERVICE_NAME").unwrap_or(defaults.service_name);
        let log_level = std::env::var("RUST_LOG").unwrap_or(defaults.log_level);
        let json = std::env::var("UPSELL_LOG_JSON")
            .map(|value| matches!(value.as_str(), "1" | "true"))
            .unwrap_or(false);
        let log_file = std::env::var("UPSELL_LOG_FILE").ok().map(PathBuf::from);

        Self {
            service_name,
            service_version: defaults.service_version,
            log_level,
            json,
            log_file,
        }
    }

    /// Development configuration with verbose session logging
    pub fn dev() -> Self {
        Self {
            log_level: "upsell=debug,upsell_session=debug,upsell_http=debug".to_string(),
            ..Self::default()
        }
    }
}
