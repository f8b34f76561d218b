//! Initialization functions for tracing

use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{CoreError, CoreResult};
use crate::tracing::config::InstrumentationConfig;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialize tracing with the given configuration
///
/// Fails if a global subscriber is already installed or the log file cannot be opened.
pub fn init_tracing(config: &InstrumentationConfig) -> CoreResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let mut layers: Vec<BoxedLayer> = vec![console_layer(config.json)];

    if let Some(path) = &config.log_file {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        layers.push(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(true)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .map_err(|err| CoreError::logging(err.to_string()))?;

    tracing::debug!(
        service = %config.service_name,
        version = %config.service_version,
        "tracing initialized"
    );

    Ok(())
}

fn console_layer(json: bool) -> BoxedLayer {
    if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    }
}
