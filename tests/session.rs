#![allow(clippy::unwrap_used)]

use murmur::{
    api::ApiClient,
    services::{
        messages,
        types::{LoginCredentials, RegisterRequest},
    },
    session::{AuthSession, SessionError, SessionState, SESSION_EXPIRED},
    storage::{MemoryTokenStore, TokenKind, TokenStore},
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use std::{sync::Arc, time::Duration};
use wiremock::{
    matchers::{body_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn secret(value: &str) -> SecretString {
    SecretString::from(value.to_string())
}

fn session(server: &MockServer, store: &Arc<MemoryTokenStore>) -> AuthSession {
    let tokens: Arc<dyn TokenStore> = store.clone();
    let client = ApiClient::new(&format!("{}/api", server.uri()), tokens, Arc::new(|| {})).unwrap();
    AuthSession::new(client)
}

fn credentials(password: &str) -> LoginCredentials {
    LoginCredentials {
        email_or_username: "alice".to_string(),
        password: secret(password),
    }
}

fn auth_body(username: &str) -> serde_json::Value {
    json!({
        "user": {"username": username, "link_is_active": false},
        "tokens": {"access": "a1", "refresh": "r1"}
    })
}

#[tokio::test]
async fn start_restores_session_from_stored_token() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryTokenStore::new());
    store.set(TokenKind::Access, secret("a0"));
    store.set(TokenKind::Refresh, secret("r0"));

    Mock::given(method("GET"))
        .and(path("/api/accounts/profile/"))
        .and(header("Authorization", "Bearer a0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"username": "alice"})))
        .expect(1)
        .mount(&server)
        .await;

    let session = session(&server, &store);
    let snapshot = session.start().await;

    assert!(snapshot.is_authenticated);
    assert!(!snapshot.is_loading);
    assert_eq!(snapshot.user.unwrap().username(), Some("alice"));
}

#[tokio::test]
async fn start_with_rejected_token_clears_store() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryTokenStore::new());
    store.set(TokenKind::Access, secret("a0"));
    store.set(TokenKind::Refresh, secret("r0"));

    Mock::given(method("GET"))
        .and(path("/api/accounts/profile/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/accounts/token/refresh/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let session = session(&server, &store);
    let snapshot = session.start().await;

    assert!(!snapshot.is_authenticated);
    assert_eq!(snapshot.error.as_deref(), Some(SESSION_EXPIRED));
    assert!(!store.has(TokenKind::Access));
    assert!(!store.has(TokenKind::Refresh));
}

#[tokio::test]
async fn login_stores_tokens_and_authenticates() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryTokenStore::new());

    Mock::given(method("POST"))
        .and(path("/api/accounts/login/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_body("alice")))
        .expect(1)
        .mount(&server)
        .await;

    let session = session(&server, &store);
    session.start().await;
    let response = session.login(&credentials("pw")).await.unwrap();

    assert_eq!(response.user.username(), Some("alice"));
    assert_eq!(
        store.get(TokenKind::Access).unwrap().expose_secret(),
        "a1"
    );
    assert_eq!(
        store.get(TokenKind::Refresh).unwrap().expose_secret(),
        "r1"
    );
    assert!(session.snapshot().is_authenticated);
}

#[tokio::test]
async fn failed_login_records_server_message() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryTokenStore::new());

    Mock::given(method("POST"))
        .and(path("/api/accounts/login/"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"non_field_errors": ["Invalid credentials"]})),
        )
        .mount(&server)
        .await;

    let session = session(&server, &store);
    session.start().await;
    let err = session.login(&credentials("wrong")).await.unwrap_err();

    assert!(matches!(err, SessionError::Api(_)));
    let snapshot = session.snapshot();
    assert!(!snapshot.is_authenticated);
    assert_eq!(snapshot.error.as_deref(), Some("Invalid credentials"));
    assert!(!store.has(TokenKind::Access));
}

#[tokio::test]
async fn failed_registration_uses_detail() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryTokenStore::new());

    Mock::given(method("POST"))
        .and(path("/api/accounts/register/"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"detail": "Registration closed"})),
        )
        .mount(&server)
        .await;

    let session = session(&server, &store);
    session.start().await;
    let data = RegisterRequest {
        username: "carol".to_string(),
        email: "carol@example.com".to_string(),
        password: secret("pw"),
        password_confirm: secret("pw"),
        ..RegisterRequest::default()
    };
    session.register(&data).await.unwrap_err();

    assert_eq!(
        session.snapshot().error.as_deref(),
        Some("Registration closed")
    );
}

#[tokio::test]
async fn logout_clears_tokens_even_when_server_fails() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryTokenStore::new());
    store.set(TokenKind::Access, secret("a0"));
    store.set(TokenKind::Refresh, secret("r0"));

    Mock::given(method("GET"))
        .and(path("/api/accounts/profile/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"username": "alice"})))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/accounts/logout-all/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let session = session(&server, &store);
    session.start().await;
    session.logout().await;

    assert_eq!(session.state(), SessionState::Anonymous { error: None });
    assert!(!store.has(TokenKind::Access));
    assert!(!store.has(TokenKind::Refresh));
}

#[tokio::test]
async fn concurrent_login_is_rejected_while_first_is_in_flight() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryTokenStore::new());

    Mock::given(method("POST"))
        .and(path("/api/accounts/login/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(auth_body("alice"))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let session = session(&server, &store);
    session.start().await;

    let mut rx = session.subscribe();
    let first = {
        let session = session.clone();
        tokio::spawn(async move { session.login(&credentials("pw")).await })
    };

    rx.wait_for(|state| matches!(state, SessionState::AuthInFlight))
        .await
        .unwrap();

    let second = session.login(&credentials("pw")).await;
    assert!(matches!(second, Err(SessionError::TransitionInFlight)));

    first.await.unwrap().unwrap();
    assert!(session.snapshot().is_authenticated);
}

#[tokio::test]
async fn refresh_profile_replaces_user() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryTokenStore::new());
    store.set(TokenKind::Access, secret("a0"));

    Mock::given(method("GET"))
        .and(path("/api/accounts/profile/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"username": "alice"})))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/accounts/profile/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"username": "alice", "link_is_active": true})),
        )
        .mount(&server)
        .await;

    let session = session(&server, &store);
    session.start().await;
    assert!(!session.snapshot().user.unwrap().link_is_active());

    let user = session.refresh_profile().await.unwrap();
    assert!(user.link_is_active());
    assert!(session.snapshot().user.unwrap().link_is_active());
}

#[tokio::test]
async fn refresh_profile_after_session_loss_drops_to_anonymous() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryTokenStore::new());
    store.set(TokenKind::Access, secret("a0"));
    store.set(TokenKind::Refresh, secret("r0"));

    Mock::given(method("GET"))
        .and(path("/api/accounts/profile/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"username": "alice"})))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/accounts/profile/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/accounts/token/refresh/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let session = session(&server, &store);
    session.start().await;
    assert!(session.snapshot().is_authenticated);

    let err = session.refresh_profile().await.unwrap_err();
    assert!(matches!(err, SessionError::Api(ref api) if api.is_unauthorized()));

    let snapshot = session.snapshot();
    assert!(!snapshot.is_authenticated);
    assert_eq!(snapshot.error.as_deref(), Some(SESSION_EXPIRED));
}

#[tokio::test]
async fn start_with_expired_access_token_refreshes_and_authenticates() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryTokenStore::new());
    store.set(TokenKind::Access, secret("expired"));
    store.set(TokenKind::Refresh, secret("r0"));

    Mock::given(method("GET"))
        .and(path("/api/accounts/profile/"))
        .and(header("Authorization", "Bearer expired"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/accounts/token/refresh/"))
        .and(body_json(json!({"refresh": "r0"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "renewed"})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/accounts/profile/"))
        .and(header("Authorization", "Bearer renewed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"username": "alice"})))
        .expect(1)
        .mount(&server)
        .await;

    let session = session(&server, &store);
    let snapshot = session.start().await;

    assert!(snapshot.is_authenticated);
    assert_eq!(snapshot.user.unwrap().username(), Some("alice"));
    assert_eq!(
        store.get(TokenKind::Access).unwrap().expose_secret(),
        "renewed"
    );
}

#[tokio::test]
async fn failed_refresh_on_any_request_ends_authenticated_session() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryTokenStore::new());
    store.set(TokenKind::Access, secret("a0"));
    store.set(TokenKind::Refresh, secret("r0"));

    Mock::given(method("GET"))
        .and(path("/api/accounts/profile/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"username": "alice"})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/core/messages/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/accounts/token/refresh/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let session = session(&server, &store);
    session.start().await;
    assert!(session.snapshot().is_authenticated);

    let mut rx = session.subscribe();
    let err = messages::list(session.client(), 1, None).await.unwrap_err();
    assert!(err.is_unauthorized());

    assert!(rx.has_changed().unwrap());
    let snapshot = session.snapshot();
    assert!(!snapshot.is_authenticated);
    assert_eq!(snapshot.error.as_deref(), Some(SESSION_EXPIRED));
    assert!(!store.has(TokenKind::Access));
}

#[tokio::test]
async fn delete_account_ends_session_without_remote_logout() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryTokenStore::new());
    store.set(TokenKind::Access, secret("a0"));
    store.set(TokenKind::Refresh, secret("r0"));

    Mock::given(method("GET"))
        .and(path("/api/accounts/profile/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"username": "alice"})))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/accounts/delete-account/"))
        .and(body_json(json!({"password": "pw"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/accounts/logout-all/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let session = session(&server, &store);
    session.start().await;
    session.delete_account(&secret("pw")).await.unwrap();

    assert_eq!(session.state(), SessionState::Anonymous { error: None });
    assert!(!store.has(TokenKind::Access));
    assert!(!store.has(TokenKind::Refresh));
}

#[tokio::test]
async fn rejected_account_deletion_keeps_session() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryTokenStore::new());
    store.set(TokenKind::Access, secret("a0"));
    store.set(TokenKind::Refresh, secret("r0"));

    Mock::given(method("GET"))
        .and(path("/api/accounts/profile/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"username": "alice"})))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/accounts/delete-account/"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"password": ["Wrong password."]})),
        )
        .mount(&server)
        .await;

    let session = session(&server, &store);
    session.start().await;
    session.delete_account(&secret("nope")).await.unwrap_err();

    assert!(session.snapshot().is_authenticated);
    assert!(store.has(TokenKind::Access));
}
