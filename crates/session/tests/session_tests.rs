//! Session lifecycle against a mock auth service

mod common;

use common::{
    credentials, harness, harness_with, jwt_expiring_in, logged_in, mount_password_grant,
    refresh_calls, token_body,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use upsell_http::ClientError;
use upsell_session::{
    FileStorage, HistoryNavigator, Route, SessionClient, SessionConfig, SessionState, TokenStore,
};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

/// Lead time that fires the proactive refresh within a second or two
fn fast_refresh() -> SessionConfig {
    SessionConfig {
        refresh_margin: Duration::from_millis(2_500),
        ..SessionConfig::default()
    }
}

async fn wait_for_state(
    session: &SessionClient,
    predicate: impl Fn(&upsell_session::SessionSnapshot) -> bool,
) {
    let mut updates = session.subscribe();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if predicate(&updates.borrow_and_update()) {
                return;
            }
            updates.changed().await.unwrap();
        }
    })
    .await
    .expect("session never reached the expected state");
}

#[tokio::test]
async fn starts_logged_out_and_loading() {
    let harness = harness().await;
    let snapshot = harness.session.snapshot();

    assert_eq!(snapshot.state, SessionState::LoggedOut);
    assert!(snapshot.is_loading);
    assert!(!snapshot.is_authenticated());
    assert!(harness.session.access_token().is_none());
}

#[tokio::test]
async fn login_stores_tokens_and_lands() {
    let harness = harness().await;
    mount_password_grant(&harness.server, "A1", "R1").await;

    let user = harness.session.login(&credentials()).await.unwrap();

    assert_eq!(user.id, "u-1");
    assert_eq!(harness.session.access_token().as_deref(), Some("A1"));
    assert_eq!(harness.store.get_refresh_token().as_deref(), Some("R1"));
    assert_eq!(harness.navigator.last(), Some(Route::Landing));

    let snapshot = harness.session.snapshot();
    assert_eq!(snapshot.state, SessionState::Authenticated);
    assert!(snapshot.is_authenticated());
    assert!(!snapshot.is_loading);
    assert_eq!(snapshot.user.unwrap().name.as_deref(), Some("Store Ops"));
}

#[tokio::test]
async fn login_accepts_numeric_user_id() {
    let harness = harness().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(query_param("grant_type", "password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "A1",
            "refresh_token": "R1",
            "user": {"id": 7, "email": "ops@example.com"}
        })))
        .mount(&harness.server)
        .await;

    let user = harness.session.login(&credentials()).await.unwrap();

    assert_eq!(user.id, "7");
    assert_eq!(harness.session.snapshot().state, SessionState::Authenticated);
    assert_eq!(harness.store.get_refresh_token().as_deref(), Some("R1"));
}

#[tokio::test]
async fn failed_login_surfaces_error_and_clears_state() {
    let harness = harness().await;
    harness.store.set_refresh_token("left-over");

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(query_param("grant_type", "password"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "Bad credentials"})))
        .mount(&harness.server)
        .await;

    let result = harness.session.login(&credentials()).await;

    assert!(matches!(result, Err(ClientError::LoginFailed(ref m)) if m == "Bad credentials"));
    assert!(harness.session.access_token().is_none());
    assert!(harness.store.get_refresh_token().is_none());
    assert!(harness.navigator.history().is_empty());

    let snapshot = harness.session.snapshot();
    assert_eq!(snapshot.state, SessionState::LoggedOut);
    assert!(!snapshot.is_loading);
}

#[tokio::test]
async fn initialize_without_stored_token() {
    let harness = harness().await;

    let snapshot = harness.session.initialize().await;

    assert_eq!(snapshot.state, SessionState::LoggedOut);
    assert!(!snapshot.is_loading);
    assert_eq!(refresh_calls(&harness.server).await, 0);
}

#[tokio::test]
async fn initialize_restores_stored_session() {
    let harness = harness().await;
    harness.store.set_refresh_token("R1");

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(query_param("grant_type", "refresh_token"))
        .and(body_json(json!({"refresh_token": "R1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("A2", "R2")))
        .expect(1)
        .mount(&harness.server)
        .await;

    let snapshot = harness.session.initialize().await;

    assert_eq!(snapshot.state, SessionState::Authenticated);
    assert!(!snapshot.is_loading);
    assert_eq!(snapshot.user.unwrap().id, "u-1");
    assert_eq!(harness.session.access_token().as_deref(), Some("A2"));
    assert_eq!(harness.store.get_refresh_token().as_deref(), Some("R2"));
}

#[tokio::test]
async fn initialize_with_rejected_token_logs_out() {
    let harness = harness().await;
    harness.store.set_refresh_token("stale");

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(query_param("grant_type", "refresh_token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})))
        .mount(&harness.server)
        .await;

    let snapshot = harness.session.initialize().await;

    assert_eq!(snapshot.state, SessionState::LoggedOut);
    assert!(!snapshot.is_loading);
    assert!(harness.store.get_refresh_token().is_none());
    assert!(harness.session.access_token().is_none());
}

#[tokio::test]
async fn refresh_token_replaces_both_tokens() {
    let harness = logged_in().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(query_param("grant_type", "refresh_token"))
        .and(body_json(json!({"refresh_token": "R1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("A2", "R2")))
        .mount(&harness.server)
        .await;

    harness.session.refresh_token().await.unwrap();

    assert_eq!(harness.session.access_token().as_deref(), Some("A2"));
    assert_eq!(harness.store.get_refresh_token().as_deref(), Some("R2"));
    assert_eq!(harness.session.snapshot().state, SessionState::Authenticated);
}

#[tokio::test]
async fn refresh_token_failure_redirects_to_login() {
    let harness = logged_in().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(query_param("grant_type", "refresh_token"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&harness.server)
        .await;

    let result = harness.session.refresh_token().await;

    assert!(matches!(result, Err(ClientError::RefreshFailed(_))));
    assert!(harness.store.get_refresh_token().is_none());
    assert!(harness.session.access_token().is_none());
    assert_eq!(harness.navigator.last(), Some(Route::Login));
}

#[tokio::test]
async fn logout_invalidates_server_side_and_clears() {
    let harness = logged_in().await;

    Mock::given(method("POST"))
        .and(path("/logout"))
        .and(header("authorization", "Bearer A1"))
        .and(body_json(json!({"refresh_token": "R1"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&harness.server)
        .await;

    harness.session.logout().await;

    assert!(harness.session.access_token().is_none());
    assert!(harness.store.get_refresh_token().is_none());
    assert_eq!(harness.navigator.last(), Some(Route::Login));
    assert_eq!(harness.session.snapshot().state, SessionState::LoggedOut);
}

#[tokio::test]
async fn logout_succeeds_when_server_fails() {
    let harness = logged_in().await;

    Mock::given(method("POST"))
        .and(path("/logout"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&harness.server)
        .await;

    harness.session.logout().await;

    assert!(harness.store.get_refresh_token().is_none());
    assert_eq!(harness.session.snapshot().state, SessionState::LoggedOut);
}

#[tokio::test]
async fn logout_without_session_skips_server_call() {
    let harness = harness().await;

    harness.session.logout().await;

    assert!(harness.server.received_requests().await.unwrap().is_empty());
    assert_eq!(harness.navigator.last(), Some(Route::Login));
}

#[tokio::test]
async fn subscribers_see_transitions() {
    let harness = harness().await;
    mount_password_grant(&harness.server, "A1", "R1").await;
    let mut updates = harness.session.subscribe();

    harness.session.login(&credentials()).await.unwrap();

    assert!(updates.has_changed().unwrap());
    assert!(updates.borrow_and_update().is_authenticated());

    harness.session.logout().await;
    assert!(updates.has_changed().unwrap());
    assert_eq!(updates.borrow_and_update().state, SessionState::LoggedOut);
}

#[tokio::test]
async fn verify_asks_the_auth_service() {
    let harness = logged_in().await;

    Mock::given(method("GET"))
        .and(path("/verify"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"valid": true})))
        .mount(&harness.server)
        .await;

    assert!(harness.session.verify().await.unwrap());

    harness.session.logout().await;
    assert!(!harness.session.verify().await.unwrap());
}

#[tokio::test]
async fn proactive_refresh_fires_before_expiry() {
    let harness = harness_with(fast_refresh()).await;
    let first = jwt_expiring_in(3);
    let second = jwt_expiring_in(3_600);
    mount_password_grant(&harness.server, &first, "R1").await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(query_param("grant_type", "refresh_token"))
        .and(body_json(json!({"refresh_token": "R1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(&second, "R2")))
        .expect(1)
        .mount(&harness.server)
        .await;

    harness.session.login(&credentials()).await.unwrap();
    assert_eq!(harness.session.access_token().as_deref(), Some(first.as_str()));

    let store = harness.store.clone();
    wait_for_state(&harness.session, move |_| {
        store.get_refresh_token().as_deref() == Some("R2")
    })
    .await;

    assert_eq!(harness.session.access_token().as_deref(), Some(second.as_str()));
    assert_eq!(harness.session.snapshot().state, SessionState::Authenticated);
}

#[tokio::test]
async fn proactive_refresh_failure_logs_out() {
    let harness = harness_with(fast_refresh()).await;
    mount_password_grant(&harness.server, &jwt_expiring_in(3), "R1").await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(query_param("grant_type", "refresh_token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "revoked"})))
        .expect(1)
        .mount(&harness.server)
        .await;

    harness.session.login(&credentials()).await.unwrap();

    wait_for_state(&harness.session, |snapshot| {
        snapshot.state == SessionState::LoggedOut
    })
    .await;

    // Let the timer task finish before looking at the redirects
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(harness.store.get_refresh_token().is_none());
    assert!(harness.session.access_token().is_none());
    assert_eq!(harness.navigator.history(), vec![Route::Landing, Route::Login]);
}

#[tokio::test]
async fn logout_cancels_the_pending_refresh() {
    let harness = harness_with(fast_refresh()).await;
    mount_password_grant(&harness.server, &jwt_expiring_in(4), "R1").await;

    Mock::given(method("POST"))
        .and(path("/logout"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&harness.server)
        .await;

    harness.session.login(&credentials()).await.unwrap();
    harness.session.logout().await;

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(refresh_calls(&harness.server).await, 0);
}

#[tokio::test]
async fn file_backed_session_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("session.json");
    let harness = harness().await;
    mount_password_grant(&harness.server, "A1", "R1").await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(query_param("grant_type", "refresh_token"))
        .and(body_json(json!({"refresh_token": "R1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("A2", "R2")))
        .expect(1)
        .mount(&harness.server)
        .await;

    let build = || {
        let api = upsell_http::ApiClient::new(harness.server.uri()).unwrap();
        let store = TokenStore::new(Arc::new(FileStorage::new(&file)));
        SessionClient::builder(api)
            .token_store(store)
            .navigator(Arc::new(HistoryNavigator::new()))
            .build()
    };

    let first = build();
    first.login(&credentials()).await.unwrap();
    drop(first);

    let second = build();
    assert!(second.access_token().is_none());
    let snapshot = second.initialize().await;

    assert_eq!(snapshot.state, SessionState::Authenticated);
    assert_eq!(second.access_token().as_deref(), Some("A2"));
    assert_eq!(second.token_store().get_refresh_token().as_deref(), Some("R2"));
}

#[tokio::test]
async fn logout_during_refresh_discards_the_result() {
    let harness = logged_in().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(query_param("grant_type", "refresh_token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body("A2", "R2"))
                .set_delay(Duration::from_millis(500)),
        )
        .expect(1)
        .mount(&harness.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/logout"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&harness.server)
        .await;

    let session = harness.session.clone();
    let (refreshed, ()) = tokio::join!(harness.session.refresh_token(), async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        session.logout().await;
    });

    assert!(matches!(refreshed, Err(ClientError::RefreshFailed(_))));
    assert!(harness.session.access_token().is_none());
    assert!(harness.store.get_refresh_token().is_none());

    let snapshot = harness.session.snapshot();
    assert_eq!(snapshot.state, SessionState::LoggedOut);
    assert!(snapshot.user.is_none());
}
