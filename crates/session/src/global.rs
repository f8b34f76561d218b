//! Process-wide session handle
//!
//! Independent call sites share one [`SessionClient`] without threading it
//! through every constructor. Install it once at startup; it lives until the
//! process exits, and `logout` resets its state rather than removing it.

use crate::gateway::RequestGateway;
use crate::session::SessionClient;
use once_cell::sync::OnceCell;

static SESSION: OnceCell<SessionClient> = OnceCell::new();

/// Install the process-wide session
///
/// Returns the rejected client if one is already installed.
pub fn install(session: SessionClient) -> Result<(), SessionClient> {
    SESSION.set(session)
}

/// The process-wide session, if installed
pub fn session() -> Option<SessionClient> {
    SESSION.get().cloned()
}

/// Gateway bound to the process-wide session
pub fn gateway() -> Option<RequestGateway> {
    session().map(RequestGateway::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token_store::TokenStore;
    use upsell_http::ApiClient;

    #[test]
    fn install_once() {
        let api = ApiClient::new("http://localhost:9").unwrap();
        let first = SessionClient::new(api.clone(), TokenStore::in_memory());
        let second = SessionClient::new(api, TokenStore::in_memory());

        assert!(install(first).is_ok());
        assert!(install(second).is_err());
        assert!(session().is_some());
        assert!(gateway().is_some());
    }
}
