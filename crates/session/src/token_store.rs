//! Refresh token persistence

use crate::config::AuthConfig;
use crate::storage::{MemoryStorage, Storage};
use std::sync::Arc;

pub use crate::jwt::{
    DecodedClaims, decode_token, is_token_expired, is_token_expired_at, time_until_expiry,
    time_until_expiry_at,
};

/// Stores the refresh token under [`AuthConfig::REFRESH_TOKEN_KEY`]
///
/// Every operation fails soft: a missing or broken storage area behaves like
/// an empty one and writes become no-ops.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn Storage>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Store backed by process memory
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    pub fn set_refresh_token(&self, token: &str) {
        if let Err(err) = self.storage.set_item(AuthConfig::REFRESH_TOKEN_KEY, token) {
            tracing::debug!("Refresh token not persisted: {err}");
        }
    }

    pub fn get_refresh_token(&self) -> Option<String> {
        match self.storage.get_item(AuthConfig::REFRESH_TOKEN_KEY) {
            Ok(token) => token,
            Err(err) => {
                tracing::debug!("Refresh token not readable: {err}");
                None
            }
        }
    }

    pub fn remove_refresh_token(&self) {
        if let Err(err) = self.storage.remove_item(AuthConfig::REFRESH_TOKEN_KEY) {
            tracing::debug!("Refresh token not removed: {err}");
        }
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore").finish_non_exhaustive()
    }
}
