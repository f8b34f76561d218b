//! Upsell core types and utilities

pub mod error;
#[cfg(feature = "tracing")]
pub mod tracing;

pub use error::{CoreError, CoreResult};
