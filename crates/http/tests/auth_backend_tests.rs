//! Integration tests for the REST auth backend and the session store on top of it

mod common;

use common::token_for;
use portico_core::{
    AuthBackend, BackendError, Credentials, MemoryTokenStorage, SessionError, SessionState,
    SessionStore,
};
use portico_http::HttpAuthBackend;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_sign_in_posts_credentials() {
    let mock_server = MockServer::start().await;
    let token = token_for("u-1", "hospital");

    Mock::given(method("POST"))
        .and(path("/auth/signin"))
        .and(body_json(json!({ "email": "er@example.org", "password": "pw" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": token })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let backend = HttpAuthBackend::from_base_url(mock_server.uri()).unwrap();
    let grant = backend
        .sign_in(&Credentials::new("er@example.org", "pw"))
        .await
        .unwrap();

    assert_eq!(grant.access_token, token);
    assert!(grant.identity.is_none());
}

#[tokio::test]
async fn test_rejection_carries_backend_message() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/signin"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "message": "Invalid login credentials" })),
        )
        .mount(&mock_server)
        .await;

    let backend = HttpAuthBackend::from_base_url(mock_server.uri()).unwrap();
    let err = backend
        .sign_in(&Credentials::new("er@example.org", "wrong"))
        .await
        .unwrap_err();

    assert_eq!(err, BackendError::Rejected("Invalid login credentials".into()));
}

#[tokio::test]
async fn test_server_errors_are_unavailable() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&mock_server)
        .await;

    let backend = HttpAuthBackend::from_base_url(mock_server.uri()).unwrap();
    let err = backend.refresh_session("tok").await.unwrap_err();
    assert!(matches!(err, BackendError::Unavailable(_)));
}

#[tokio::test]
async fn test_unreachable_backend_is_unavailable() {
    // Port 9 (discard) is not expected to accept HTTP connections
    let backend = HttpAuthBackend::from_base_url("http://127.0.0.1:9").unwrap();
    let err = backend
        .sign_in(&Credentials::new("er@example.org", "pw"))
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::Unavailable(_)));
}

#[tokio::test]
async fn test_refresh_and_sign_out_send_bearer_token() {
    let mock_server = MockServer::start().await;
    let fresh = token_for("u-1", "ambulance");

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(header("authorization", "Bearer old-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": fresh })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/signout"))
        .and(header("authorization", "Bearer old-token"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let backend = HttpAuthBackend::from_base_url(mock_server.uri()).unwrap();
    assert_eq!(
        backend.refresh_session("old-token").await.unwrap().access_token,
        fresh
    );
    backend.sign_out("old-token").await.unwrap();
}

#[tokio::test]
async fn test_session_lifecycle_over_http() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/signin"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "access_token": token_for("u-5", "patient") })),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "refresh token revoked" })))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/signout"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let backend = HttpAuthBackend::from_base_url(mock_server.uri()).unwrap();
    let store = SessionStore::new(Arc::new(backend), Arc::new(MemoryTokenStorage::new()));
    assert_eq!(store.initialize().await, SessionState::Unauthenticated);

    let identity = store
        .sign_in(&Credentials::new("u-5@example.org", "pw"))
        .await
        .unwrap();
    assert_eq!(identity.role, "patient");
    assert_eq!(identity.name, "Test User");

    assert_eq!(
        store.refresh_session().await.unwrap_err(),
        SessionError::SessionExpired
    );
    assert_eq!(store.state(), SessionState::Unauthenticated);
}

#[tokio::test]
async fn test_bad_credentials_over_http_leave_store_unauthenticated() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/signin"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "invalid_grant" })))
        .mount(&mock_server)
        .await;

    let backend = HttpAuthBackend::from_base_url(mock_server.uri()).unwrap();
    let store = SessionStore::new(Arc::new(backend), Arc::new(MemoryTokenStorage::new()));
    store.initialize().await;

    let err = store
        .sign_in(&Credentials::new("u-5@example.org", "nope"))
        .await
        .unwrap_err();
    assert_eq!(err, SessionError::AuthenticationFailed("invalid_grant".into()));
    assert!(!store.is_authenticated());
}
