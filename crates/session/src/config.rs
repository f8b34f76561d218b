//! Session configuration

use std::time::Duration;

/// Authentication constants
pub struct AuthConfig;

impl AuthConfig {
    /// Storage key holding the refresh token
    pub const REFRESH_TOKEN_KEY: &'static str = "upsell_refresh_token";

    /// How long before access token expiry the proactive refresh fires
    pub const REFRESH_MARGIN: Duration = Duration::from_secs(5 * 60);

    /// Unauthenticated entry point
    pub const LOGIN_ROUTE: &'static str = "/login";

    /// Authenticated landing area
    pub const LANDING_ROUTE: &'static str = "/dashboard";
}

/// Runtime knobs of a [`crate::SessionClient`]
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Lead time of the proactive refresh
    pub refresh_margin: Duration,
    /// Whether to arm the proactive refresh timer at all
    pub proactive_refresh: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_margin: AuthConfig::REFRESH_MARGIN,
            proactive_refresh: true,
        }
    }
}
