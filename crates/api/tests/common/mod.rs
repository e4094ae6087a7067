#![allow(dead_code)]

use std::sync::Arc;

use adpass_api::auth::password::hash_password;
use adpass_api::config::ServerConfig;
use adpass_api::router::build_app_router;
use adpass_api::state::AppState;
use adpass_core::auth::JwtConfig;
use adpass_core::memory::MemoryStore;
use adpass_core::roles::UserRole;
use adpass_core::store::{NewUser, UserStore};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

pub const PASSWORD: &str = "correct-horse-battery";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        password_min_length: 8,
        session_cleanup_interval_secs: 3600,
        jwt: JwtConfig {
            secret: "api-test-secret-long-enough-for-hmac".to_string(),
            access_token_expiry_mins: 15,
            refresh_token_expiry_days: 30,
        },
    }
}

/// The full router over an in-memory store, plus a handle on that store.
pub struct TestApp {
    pub app: Router,
    pub store: Arc<MemoryStore>,
}

/// Build the application with the same middleware stack production uses.
pub fn build_test_app() -> TestApp {
    let config = test_config();
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(store.clone(), config.clone());
    TestApp {
        app: build_app_router(state, &config),
        store,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

async fn send(
    app: Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response {
    send(app, Method::POST, uri, None, Some(body)).await
}

pub async fn post_json_auth(app: Router, uri: &str, body: Value, token: &str) -> Response {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn post_auth(app: Router, uri: &str, token: &str) -> Response {
    send(app, Method::POST, uri, Some(token), None).await
}

pub async fn put_auth(app: Router, uri: &str, token: &str) -> Response {
    send(app, Method::PUT, uri, Some(token), None).await
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Account helpers
// ---------------------------------------------------------------------------

/// Register through the API and return the token response.
pub async fn register(app: Router, email: &str) -> Value {
    let body = serde_json::json!({ "email": email, "password": PASSWORD });
    let response = post_json(app, "/api/v1/auth/register", body).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

/// Log in through the API and return the token response.
pub async fn login(app: Router, email: &str, device_id: Option<&str>) -> Value {
    let body = serde_json::json!({ "email": email, "password": PASSWORD, "device_id": device_id });
    let response = post_json(app, "/api/v1/auth/login", body).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

/// Create an admin directly in the store and return an access token for it.
pub async fn admin_token(t: &TestApp) -> String {
    t.store
        .create_user(&NewUser {
            email: "admin@example.com".to_string(),
            external_id: None,
            password_hash: Some(hash_password(PASSWORD).unwrap()),
            email_verified: true,
            role: UserRole::Admin,
        })
        .await
        .unwrap();
    let json = login(t.app.clone(), "admin@example.com", None).await;
    json["access_token"].as_str().unwrap().to_string()
}

pub fn token(json: &Value, field: &str) -> String {
    json[field].as_str().unwrap().to_string()
}
