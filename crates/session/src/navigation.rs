//! Redirect seam between the session and whatever renders pages

use crate::config::AuthConfig;
use std::sync::{Mutex, PoisonError};

/// Destinations the session can send the user to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Unauthenticated entry point
    Login,
    /// Authenticated landing area
    Landing,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Self::Login => AuthConfig::LOGIN_ROUTE,
            Self::Landing => AuthConfig::LANDING_ROUTE,
        }
    }
}

/// Receives the session's redirects
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// Navigator for headless use: logs the redirect and does nothing else
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn navigate(&self, route: Route) {
        tracing::info!(path = route.path(), "Navigating");
    }
}

/// Navigator that remembers every redirect
#[derive(Debug, Default)]
pub struct HistoryNavigator {
    history: Mutex<Vec<Route>>,
}

impl HistoryNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<Route> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last(&self) -> Option<Route> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .copied()
    }
}

impl Navigator for HistoryNavigator {
    fn navigate(&self, route: Route) {
        tracing::debug!(path = route.path(), "Navigating");
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(route);
    }
}
