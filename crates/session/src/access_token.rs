//! In-memory access token cell

use arc_swap::ArcSwapOption;
use std::sync::Arc;

/// Holds the current access token for the life of the session
///
/// The token never leaves process memory. Readers get a snapshot; a refresh
/// swaps the whole value in one store.
#[derive(Default)]
pub struct AccessTokenCell {
    token: ArcSwapOption<String>,
}

impl AccessTokenCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Arc<String>> {
        self.token.load_full()
    }

    pub fn set(&self, token: impl Into<String>) {
        self.token.store(Some(Arc::new(token.into())));
    }

    pub fn clear(&self) {
        self.token.store(None);
    }

    pub fn is_set(&self) -> bool {
        self.token.load().is_some()
    }
}

impl std::fmt::Debug for AccessTokenCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessTokenCell")
            .field("is_set", &self.is_set())
            .finish()
    }
}
