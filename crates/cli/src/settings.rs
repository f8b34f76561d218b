//! CLI settings: defaults, optional config file, `UPSELL__*` environment

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use upsell_core::{CoreError, CoreResult};

const ENV_PREFIX: &str = "UPSELL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub api: ApiSettings,
    pub session: SessionSettings,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Root of the dashboard backend, e.g. `https://dashboard.example.com`
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// File holding the refresh token between invocations
    pub file: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub proactive_refresh: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api: ApiSettings {
                base_url: "http://localhost:8080".to_string(),
                timeout_secs: 30,
            },
            session: SessionSettings {
                file: None,
                proactive_refresh: true,
            },
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings, layering the optional file and the environment over defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a value fails to parse
    pub fn load(path: Option<&Path>) -> CoreResult<Self> {
        let defaults = Self::default();

        let mut builder = config::Config::builder()
            .set_default("api.base_url", defaults.api.base_url)
            .and_then(|b| b.set_default("api.timeout_secs", defaults.api.timeout_secs))
            .and_then(|b| b.set_default("session.proactive_refresh", true))
            .and_then(|b| b.set_default("log_level", defaults.log_level))
            .map_err(invalid)?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(invalid)?;

        let settings: Self = settings.try_deserialize().map_err(invalid)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> CoreResult<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(CoreError::invalid_config("api.base_url must not be empty"));
        }
        if self.api.timeout_secs == 0 {
            return Err(CoreError::invalid_config("api.timeout_secs must be positive"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    /// Session file, falling back to the platform data directory
    pub fn session_file(&self) -> PathBuf {
        if let Some(file) = &self.session.file {
            return file.clone();
        }
        match ProjectDirs::from("com", "Upsell", "upsell") {
            Some(dirs) => dirs.data_dir().join("session.json"),
            None => PathBuf::from(".upsell").join("session.json"),
        }
    }
}

fn invalid(err: config::ConfigError) -> CoreError {
    CoreError::invalid_config(err.to_string())
}
