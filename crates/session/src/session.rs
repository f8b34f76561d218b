//! Session client
//!
//! Owns the in-memory access token and the session state machine:
//!
//! ```text
//! LoggedOut -> Authenticating -> Authenticated -> Refreshing -> Authenticated
//!                    |                                  |
//!                    +------------> LoggedOut <---------+
//! ```
//!
//! There is exactly one refresh routine. The proactive timer, the request
//! gateway's 401 handler and [`SessionClient::refresh_token`] all go through
//! it, and concurrent callers share a single in-flight refresh.

use crate::access_token::AccessTokenCell;
use crate::config::SessionConfig;
use crate::jwt;
use crate::navigation::{Navigator, Route, TracingNavigator};
use crate::token_store::TokenStore;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use upsell_http::types::{Credentials, TokenResponse, User};
use upsell_http::{ApiClient, ClientError};

/// Where the session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    LoggedOut,
    Authenticating,
    Authenticated,
    Refreshing,
}

/// Observable view of the session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub user: Option<User>,
    /// True until the startup check has finished
    pub is_loading: bool,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        matches!(
            self.state,
            SessionState::Authenticated | SessionState::Refreshing
        )
    }
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            state: SessionState::LoggedOut,
            user: None,
            is_loading: true,
        }
    }
}

type RefreshFuture = Shared<BoxFuture<'static, Result<TokenResponse, String>>>;

struct SessionInner {
    api: ApiClient,
    store: TokenStore,
    access: AccessTokenCell,
    navigator: Arc<dyn Navigator>,
    config: SessionConfig,
    state: watch::Sender<SessionSnapshot>,
    pending_refresh: Mutex<Option<RefreshFuture>>,
    timer: Mutex<Option<CancellationToken>>,
    /// Bumped whenever a login or logout starts a new session lifetime
    epoch: AtomicU64,
}

/// Handle to the session; clones share the same state
#[derive(Clone)]
pub struct SessionClient {
    inner: Arc<SessionInner>,
}

/// Builder for SessionClient
pub struct SessionClientBuilder {
    api: ApiClient,
    store: Option<TokenStore>,
    navigator: Option<Arc<dyn Navigator>>,
    config: SessionConfig,
}

impl SessionClientBuilder {
    /// Set the refresh token store (defaults to process memory)
    pub fn token_store(mut self, store: TokenStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the redirect target (defaults to [`TracingNavigator`])
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> SessionClient {
        let (state, _) = watch::channel(SessionSnapshot::default());
        SessionClient {
            inner: Arc::new(SessionInner {
                api: self.api,
                store: self.store.unwrap_or_default(),
                access: AccessTokenCell::new(),
                navigator: self
                    .navigator
                    .unwrap_or_else(|| Arc::new(TracingNavigator)),
                config: self.config,
                state,
                pending_refresh: Mutex::new(None),
                timer: Mutex::new(None),
                epoch: AtomicU64::new(0),
            }),
        }
    }
}

impl SessionClient {
    /// Create a session with default navigator and configuration
    pub fn new(api: ApiClient, store: TokenStore) -> Self {
        Self::builder(api).token_store(store).build()
    }

    pub fn builder(api: ApiClient) -> SessionClientBuilder {
        SessionClientBuilder {
            api,
            store: None,
            navigator: None,
            config: SessionConfig::default(),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    pub fn token_store(&self) -> &TokenStore {
        &self.inner.store
    }

    /// Current in-memory access token
    pub fn access_token(&self) -> Option<String> {
        self.inner.access.get().map(|token| token.as_ref().clone())
    }

    /// Replace the in-memory access token and re-arm the proactive refresh
    pub fn set_access_token(&self, token: impl Into<String>) {
        self.inner.access.set(token);
        self.inner.schedule_refresh();
    }

    pub fn has_refresh_token(&self) -> bool {
        self.inner.store.get_refresh_token().is_some()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every session transition
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.state.subscribe()
    }

    /// Restore a session from a stored refresh token, if there is one
    pub async fn initialize(&self) -> SessionSnapshot {
        if self.has_refresh_token() {
            debug!("Stored refresh token found, restoring session");
            match self.refresh_shared().await {
                Ok(_) => info!("Session restored"),
                Err(err) => info!("Stored session could not be restored: {err}"),
            }
        } else {
            debug!("No stored session");
            self.inner.state.send_modify(|snapshot| {
                snapshot.state = SessionState::LoggedOut;
                snapshot.is_loading = false;
            });
        }
        self.snapshot()
    }

    /// Log in with email and password
    ///
    /// On failure any partial state is cleared and the error is returned.
    pub async fn login(&self, credentials: &Credentials) -> Result<User, ClientError> {
        let inner = &self.inner;
        inner.epoch.fetch_add(1, Ordering::SeqCst);
        inner.state.send_modify(|snapshot| {
            snapshot.state = SessionState::Authenticating;
        });

        match inner.api.password_grant(credentials).await {
            Ok(tokens) => {
                inner.establish(&tokens);
                info!(user = %tokens.user.id, "Logged in");
                inner.navigator.navigate(Route::Landing);
                Ok(tokens.user)
            }
            Err(err) => {
                warn!("Login failed: {err}");
                inner.clear_tokens();
                inner.state.send_modify(|snapshot| {
                    snapshot.state = SessionState::LoggedOut;
                    snapshot.user = None;
                    snapshot.is_loading = false;
                });
                Err(err)
            }
        }
    }

    /// End the session
    ///
    /// The server-side invalidation is best effort; the local session is
    /// always cleared.
    pub async fn logout(&self) {
        let inner = &self.inner;
        inner.epoch.fetch_add(1, Ordering::SeqCst);
        inner.cancel_timer();

        if let Some(refresh_token) = inner.store.get_refresh_token() {
            let access = inner.access.get();
            if let Err(err) = inner
                .api
                .logout(access.as_deref().map(String::as_str), &refresh_token)
                .await
            {
                warn!("Server-side logout failed: {err}");
            }
        }

        inner.clear_tokens();
        inner.state.send_modify(|snapshot| {
            snapshot.state = SessionState::LoggedOut;
            snapshot.user = None;
            snapshot.is_loading = false;
        });
        info!("Logged out");
        inner.navigator.navigate(Route::Login);
    }

    /// Refresh the token pair now
    pub async fn refresh_token(&self) -> Result<(), ClientError> {
        self.refresh_shared().await.map(|_| ())
    }

    /// Ask the auth service whether the current access token is accepted
    pub async fn verify(&self) -> Result<bool, ClientError> {
        match self.inner.access.get() {
            Some(token) => self.inner.api.verify(&token).await,
            None => Ok(false),
        }
    }

    /// Join the in-flight refresh or start one; yields the new access token
    pub(crate) async fn refresh_shared(&self) -> Result<String, ClientError> {
        let refresh = {
            let mut pending = self
                .inner
                .pending_refresh
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            if let Some(refresh) = pending.as_ref() {
                trace!("Joining in-flight refresh");
                refresh.clone()
            } else {
                let inner = Arc::clone(&self.inner);
                let refresh = async move {
                    let result = inner.perform_refresh().await;
                    inner
                        .pending_refresh
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .take();
                    result
                }
                .boxed()
                .shared();
                *pending = Some(refresh.clone());
                refresh
            }
        };

        refresh
            .await
            .map(|tokens| tokens.access_token)
            .map_err(ClientError::RefreshFailed)
    }
}

impl SessionInner {
    async fn perform_refresh(self: &Arc<Self>) -> Result<TokenResponse, String> {
        let epoch = self.epoch.load(Ordering::SeqCst);

        let Some(refresh_token) = self.store.get_refresh_token() else {
            warn!("Refresh requested without a stored refresh token");
            self.expire();
            return Err("no refresh token available".to_string());
        };

        self.state.send_modify(|snapshot| {
            snapshot.state = if snapshot.is_authenticated() {
                SessionState::Refreshing
            } else {
                SessionState::Authenticating
            };
        });
        debug!("Refreshing access token");

        let result = self.api.refresh_grant(&refresh_token).await;

        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!("Session changed while refreshing, discarding result");
            return Err("session ended during refresh".to_string());
        }

        match result {
            Ok(tokens) => {
                self.establish(&tokens);
                info!(user = %tokens.user.id, "Access token refreshed");
                Ok(tokens)
            }
            Err(err) => {
                warn!("Token refresh failed: {err}");
                self.expire();
                Err(match err {
                    ClientError::RefreshFailed(message) => message,
                    other => other.to_string(),
                })
            }
        }
    }

    /// Install a fresh token pair and user
    fn establish(self: &Arc<Self>, tokens: &TokenResponse) {
        self.store.set_refresh_token(&tokens.refresh_token);
        self.access.set(tokens.access_token.as_str());
        self.state.send_modify(|snapshot| {
            snapshot.state = SessionState::Authenticated;
            snapshot.user = Some(tokens.user.clone());
            snapshot.is_loading = false;
        });
        self.schedule_refresh();
    }

    /// Drop the session after an unrecoverable refresh failure
    fn expire(&self) {
        self.clear_tokens();
        self.state.send_modify(|snapshot| {
            snapshot.state = SessionState::LoggedOut;
            snapshot.user = None;
            snapshot.is_loading = false;
        });
        self.navigator.navigate(Route::Login);
    }

    fn clear_tokens(&self) {
        self.cancel_timer();
        self.access.clear();
        self.store.remove_refresh_token();
    }

    fn cancel_timer(&self) {
        let previous = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(token) = previous {
            token.cancel();
        }
    }

    /// Arm the one-shot proactive refresh for the current access token
    fn schedule_refresh(self: &Arc<Self>) {
        if !self.config.proactive_refresh {
            return;
        }
        let Some(token) = self.access.get() else {
            self.cancel_timer();
            return;
        };
        if jwt::decode_token(&token).and_then(|claims| claims.exp).is_none() {
            debug!("Access token carries no expiry, proactive refresh not scheduled");
            self.cancel_timer();
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No tokio runtime, proactive refresh not scheduled");
            return;
        };

        let delay = jwt::time_until_expiry(&token).saturating_sub(self.config.refresh_margin);
        let cancel = CancellationToken::new();
        let previous = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(cancel.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }

        debug!(delay_ms = delay.as_millis() as u64, "Proactive refresh scheduled");
        let session: Weak<Self> = Arc::downgrade(self);
        runtime.spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {
                    trace!("Proactive refresh cancelled");
                    return;
                }
                () = tokio::time::sleep(delay) => {}
            }

            let Some(inner) = session.upgrade() else {
                return;
            };
            let client = SessionClient { inner };
            let epoch = client.inner.epoch.load(Ordering::SeqCst);
            debug!("Proactive refresh timer fired");
            if let Err(err) = client.refresh_shared().await {
                // A failed refresh has already expired the session, and a newer
                // login or logout owns the state now
                let superseded = client.inner.epoch.load(Ordering::SeqCst) != epoch;
                let logged_out = client.snapshot().state == SessionState::LoggedOut;
                if superseded || logged_out {
                    debug!("Proactive refresh failed after the session ended: {err}");
                } else {
                    warn!("Proactive refresh failed, logging out: {err}");
                    client.logout().await;
                }
            }
        });
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

impl std::fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionClient")
            .field("base_url", &self.inner.api.base_url())
            .field("snapshot", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}
