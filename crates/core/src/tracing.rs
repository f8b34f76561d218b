//! Shared tracing setup for the upsell crates

pub mod config;
pub mod init;

pub use config::InstrumentationConfig;
pub use init::init_tracing;
