//! Shared fixtures for the session integration tests

#![allow(dead_code)]

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use upsell_http::ApiClient;
use upsell_http::types::Credentials;
use upsell_session::{HistoryNavigator, SessionClient, SessionConfig, TokenStore};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Unsigned JWT with the given claims
pub fn jwt(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap());
    format!("{header}.{payload}.sig")
}

/// Unsigned JWT expiring `secs` seconds from now
pub fn jwt_expiring_in(secs: i64) -> String {
    let exp = chrono::Utc::now().timestamp() + secs;
    jwt(&json!({"sub": "u-1", "exp": exp}))
}

pub fn token_body(access: &str, refresh: &str) -> Value {
    json!({
        "access_token": access,
        "refresh_token": refresh,
        "user": {"id": "u-1", "email": "ops@example.com", "name": "Store Ops"}
    })
}

pub fn credentials() -> Credentials {
    Credentials::new("ops@example.com", "pw")
}

pub struct Harness {
    pub server: MockServer,
    pub session: SessionClient,
    pub navigator: Arc<HistoryNavigator>,
    pub store: TokenStore,
}

pub async fn harness() -> Harness {
    harness_with(SessionConfig::default()).await
}

pub async fn harness_with(config: SessionConfig) -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("upsell_session=debug")
        .try_init();

    let server = MockServer::start().await;
    let navigator = Arc::new(HistoryNavigator::new());
    let store = TokenStore::in_memory();
    let api = ApiClient::builder()
        .base_url(server.uri())
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap();
    let session = SessionClient::builder(api)
        .token_store(store.clone())
        .navigator(navigator.clone())
        .config(config)
        .build();

    Harness {
        server,
        session,
        navigator,
        store,
    }
}

pub async fn mount_password_grant(server: &MockServer, access: &str, refresh: &str) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(query_param("grant_type", "password"))
        .and(body_json(json!({"email": "ops@example.com", "password": "pw"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(access, refresh)))
        .mount(server)
        .await;
}

/// Session logged in with access token `A1` and refresh token `R1`
pub async fn logged_in() -> Harness {
    let harness = harness().await;
    mount_password_grant(&harness.server, "A1", "R1").await;
    harness.session.login(&credentials()).await.unwrap();
    harness
}

/// Number of refresh grants the server has seen
pub async fn refresh_calls(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| {
            request.url.path() == "/token"
                && request
                    .url
                    .query_pairs()
                    .any(|(key, value)| key == "grant_type" && value == "refresh_token")
        })
        .count()
}
