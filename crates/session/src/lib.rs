//! Session handling for the upsell analytics dashboard
//!
//! The dashboard never computes analytics itself; every number comes from the
//! backend API. What it does own is the session: a short-lived access token
//! kept in memory, a refresh token kept in tab-scoped storage, and a gateway
//! that keeps outbound calls authorized across token expiry.
//!
//! - [`token_store`] persists the refresh token and introspects JWT expiry.
//! - [`session`] holds the access token, drives login/logout and schedules
//!   proactive refreshes.
//! - [`gateway`] wraps every API call with the bearer header and the
//!   refresh-and-retry-once policy.

pub mod access_token;
pub mod config;
pub mod gateway;
pub mod global;
pub mod jwt;
pub mod navigation;
pub mod services;
pub mod session;
pub mod storage;
pub mod token_store;

pub use config::{AuthConfig, SessionConfig};
pub use gateway::{ApiRequest, RequestGateway};
pub use navigation::{HistoryNavigator, Navigator, Route, TracingNavigator};
pub use session::{SessionClient, SessionSnapshot, SessionState};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError, UnavailableStorage};
pub use token_store::TokenStore;
pub use upsell_http::{ApiClient, ClientError};
