//! Integration tests for the authentication endpoints

use serde_json::json;
use std::sync::Arc;
use vetdesk_core::{CredentialStore, MemoryCredentialStore, Role};
use vetdesk_http::client::auth::RegisterRequest;
use vetdesk_http::{ApiClient, ClientError, SessionEvent};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, store: &Arc<MemoryCredentialStore>) -> ApiClient {
    ApiClient::new(server.uri(), store.clone()).unwrap()
}

fn user_json() -> serde_json::Value {
    json!({ "id": 12, "name": "Dr. Grey", "email": "grey@clinic.test", "role": "veterinarian" })
}

#[tokio::test]
async fn test_login_stores_session_and_emits_event() {
    let mock_server = MockServer::start().await;
    let store = Arc::new(MemoryCredentialStore::with_tokens("previous", "previous-refresh"));

    Mock::given(method("POST"))
        .and(path("/auth/login/"))
        .and(body_json(json!({ "email": "grey@clinic.test", "password": "hunter2" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "access_token": "a1", "refresh_token": "r1", "user": user_json() }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, &store);
    let mut events = client.subscribe();

    let session = client.login("grey@clinic.test", "hunter2").await.unwrap();

    assert_eq!(session.tokens.access_token, "a1");
    assert_eq!(store.access_token().as_deref(), Some("a1"));
    assert_eq!(store.refresh_token().as_deref(), Some("r1"));
    assert_eq!(store.user().unwrap().role, Role::Veterinarian);

    match events.try_recv().unwrap() {
        SessionEvent::LoggedIn { user } => assert_eq!(user.unwrap().id, "12"),
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn test_login_replaces_previous_pair_entirely() {
    let mock_server = MockServer::start().await;
    let store = Arc::new(MemoryCredentialStore::with_tokens("old", "old-refresh"));

    Mock::given(method("POST"))
        .and(path("/auth/login/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": "a1", "user": user_json() })),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, &store);
    client.login("grey@clinic.test", "pw").await.unwrap();

    assert_eq!(store.access_token().as_deref(), Some("a1"));
    assert!(store.refresh_token().is_none());
}

#[tokio::test]
async fn test_rejected_login_never_refreshes() {
    let mock_server = MockServer::start().await;
    let store = Arc::new(MemoryCredentialStore::with_tokens("old", "r-old"));

    Mock::given(method("POST"))
        .and(path("/auth/login/"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid credentials"))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/token/refresh/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, &store);
    let result = client.login("grey@clinic.test", "wrong").await;

    assert!(matches!(result, Err(ClientError::AuthenticationFailed(ref m)) if m == "Invalid credentials"));
    let requests = mock_server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_login_without_user_fetches_profile() {
    let mock_server = MockServer::start().await;
    let store = Arc::new(MemoryCredentialStore::new());

    Mock::given(method("POST"))
        .and(path("/auth/login/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access": "a1", "refresh": "r1" })),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/me/"))
        .and(header("authorization", "Bearer a1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": user_json() })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, &store);
    let session = client.login("grey@clinic.test", "pw").await.unwrap();

    assert_eq!(session.user.unwrap().name, "Dr. Grey");
    assert_eq!(store.user().unwrap().email, "grey@clinic.test");
}

#[tokio::test]
async fn test_login_keeps_tokens_when_user_is_unreadable() {
    let mock_server = MockServer::start().await;
    let store = Arc::new(MemoryCredentialStore::new());

    Mock::given(method("POST"))
        .and(path("/auth/login/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "a1",
            "refresh_token": "r1",
            "user": { "name": "Dr. Grey" }
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/me/"))
        .and(header("authorization", "Bearer a1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, &store);
    let session = client.login("grey@clinic.test", "pw").await.unwrap();

    assert_eq!(session.tokens.access_token, "a1");
    assert_eq!(store.refresh_token().as_deref(), Some("r1"));
    assert_eq!(store.user().unwrap().id, "12");
}

#[tokio::test]
async fn test_register_stores_session() {
    let mock_server = MockServer::start().await;
    let store = Arc::new(MemoryCredentialStore::new());

    Mock::given(method("POST"))
        .and(path("/auth/register/"))
        .and(body_json(json!({
            "email": "owner@mail.test",
            "password": "pw",
            "name": "Pet Owner"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "access_token": "a1",
            "refresh_token": "r1",
            "user": { "id": "u-1", "name": "Pet Owner", "email": "owner@mail.test" }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, &store);
    let session = client
        .register(&RegisterRequest {
            email: "owner@mail.test".into(),
            password: "pw".into(),
            name: "Pet Owner".into(),
            phone: None,
        })
        .await
        .unwrap();

    assert_eq!(session.user.unwrap().role, Role::Client);
    assert_eq!(store.refresh_token().as_deref(), Some("r1"));
}

#[tokio::test]
async fn test_logout_clears_even_when_server_fails() {
    let mock_server = MockServer::start().await;
    let store = Arc::new(MemoryCredentialStore::with_tokens("a1", "r1"));

    Mock::given(method("POST"))
        .and(path("/auth/logout/"))
        .and(header("authorization", "Bearer a1"))
        .and(body_json(json!({ "refresh": "r1" })))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, &store);
    let mut events = client.subscribe();
    client.logout().await;

    assert!(store.access_token().is_none());
    assert!(store.refresh_token().is_none());
    assert_eq!(events.try_recv().unwrap(), SessionEvent::LoggedOut);
}

#[tokio::test]
async fn test_logout_without_session_skips_server() {
    let mock_server = MockServer::start().await;
    let store = Arc::new(MemoryCredentialStore::new());

    let client = client_for(&mock_server, &store);
    client.logout().await;

    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_current_user_updates_cached_profile() {
    let mock_server = MockServer::start().await;
    let store = Arc::new(MemoryCredentialStore::with_tokens("a1", "r1"));

    Mock::given(method("GET"))
        .and(path("/auth/me/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json()))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, &store);
    let user = client.current_user().await.unwrap();

    assert_eq!(user.id, "12");
    assert_eq!(store.user(), Some(user));
}
