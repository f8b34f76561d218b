//! Upsell HTTP module providing the backend API client
//!
//! The client speaks to two collaborators: the auth service (`/token`,
//! `/verify`, `/logout`) and the analytics REST API. Session handling lives
//! one layer up in `upsell-session`; this crate only knows how to issue a
//! request, attach a bearer header and map failures to [`client::error::ClientError`].

#[macro_use]
extern crate tracing;

pub mod client;
pub mod types;

pub use client::error::ClientError;
pub use client::{ApiClient, ApiClientBuilder};
