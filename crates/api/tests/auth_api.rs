//! HTTP-level tests for registration, login, refresh rotation and logout.

mod common;

use adpass_core::store::LedgerStatus;
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{body_json, get, get_auth, post_auth, post_json, token};
use serde_json::json;

// ---------------------------------------------------------------------------
// Registration and login
// ---------------------------------------------------------------------------

#[tokio::test]
async fn register_returns_tokens_for_free_user() {
    let t = common::build_test_app();
    let json = common::register(t.app.clone(), "New@Example.com").await;

    assert!(json["access_token"].is_string());
    assert_eq!(json["refresh_token"].as_str().unwrap().len(), 64);
    assert_eq!(json["expires_in"], 900);
    assert_eq!(json["user"]["email"], "new@example.com");
    assert_eq!(json["user"]["role"], "USER");
    assert_eq!(json["user"]["subscription_state"], "FREE");
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let t = common::build_test_app();
    common::register(t.app.clone(), "twice@example.com").await;

    let body = json!({ "email": "twice@example.com", "password": common::PASSWORD });
    let response = post_json(t.app.clone(), "/api/v1/auth/register", body).await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "CONFLICT");
}

#[tokio::test]
async fn registration_validates_input() {
    let t = common::build_test_app();

    let short = json!({ "email": "short@example.com", "password": "1234567" });
    let response = post_json(t.app.clone(), "/api/v1/auth/register", short).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");

    let bad_email = json!({ "email": "not-an-email", "password": common::PASSWORD });
    let response = post_json(t.app.clone(), "/api/v1/auth/register", bad_email).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_rejects_bad_credentials_uniformly() {
    let t = common::build_test_app();
    common::register(t.app.clone(), "user@example.com").await;

    let wrong = json!({ "email": "user@example.com", "password": "wrong-password" });
    let response = post_json(t.app.clone(), "/api/v1/auth/login", wrong).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let wrong_body = body_json(response).await;
    assert_eq!(wrong_body["code"], "INVALID_CREDENTIALS");

    let ghost = json!({ "email": "ghost@example.com", "password": common::PASSWORD });
    let response = post_json(t.app.clone(), "/api/v1/auth/login", ghost).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await, wrong_body);
}

#[tokio::test]
async fn login_bounds_device_id_length() {
    let t = common::build_test_app();
    common::register(t.app.clone(), "device@example.com").await;

    let body = json!({
        "email": "device@example.com",
        "password": common::PASSWORD,
        "device_id": "d".repeat(256),
    });
    let response = post_json(t.app.clone(), "/api/v1/auth/login", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");

    let body = json!({
        "email": "device@example.com",
        "password": common::PASSWORD,
        "device_id": "d".repeat(255),
    });
    let response = post_json(t.app.clone(), "/api/v1/auth/login", body).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn me_reports_profile_and_ad_status() {
    let t = common::build_test_app();
    let json = common::register(t.app.clone(), "me@example.com").await;

    let response = get_auth(t.app.clone(), "/api/v1/auth/me", &token(&json, "access_token")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let me = body_json(response).await;
    assert_eq!(me["data"]["email"], "me@example.com");
    assert_eq!(me["data"]["ads_restricted"], true);
}

#[tokio::test]
async fn me_requires_authorization() {
    let t = common::build_test_app();
    let response = get(t.app.clone(), "/api/v1/auth/me").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");
}

// ---------------------------------------------------------------------------
// Refresh rotation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn refresh_rotates_both_tokens() {
    let t = common::build_test_app();
    let issued = common::register(t.app.clone(), "rotate@example.com").await;

    let body = json!({ "refresh_token": token(&issued, "refresh_token") });
    let response = post_json(t.app.clone(), "/api/v1/auth/refresh", body).await;
    assert_eq!(response.status(), StatusCode::OK);
    let rotated = body_json(response).await;

    assert_ne!(rotated["refresh_token"], issued["refresh_token"]);
    assert_ne!(rotated["access_token"], issued["access_token"]);

    // The superseded access token no longer authorizes anything.
    let response = get_auth(
        t.app.clone(),
        "/api/v1/auth/me",
        &token(&issued, "access_token"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "SESSION_NOT_FOUND");

    let response = get_auth(
        t.app.clone(),
        "/api/v1/auth/me",
        &token(&rotated, "access_token"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn replayed_refresh_token_revokes_every_session() {
    let t = common::build_test_app();
    let phone = common::register(t.app.clone(), "victim@example.com").await;
    let laptop = common::login(t.app.clone(), "victim@example.com", Some("laptop")).await;

    let stolen = json!({ "refresh_token": token(&phone, "refresh_token") });
    let response = post_json(t.app.clone(), "/api/v1/auth/refresh", stolen.clone()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let legit = body_json(response).await;

    let response = post_json(t.app.clone(), "/api/v1/auth/refresh", stolen).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let replay_body = body_json(response).await;
    assert_eq!(replay_body["code"], "INVALID_REFRESH_TOKEN");

    // Replay and a never-issued token look identical to the caller.
    let unknown = json!({ "refresh_token": "never-issued" });
    let response = post_json(t.app.clone(), "/api/v1/auth/refresh", unknown).await;
    assert_eq!(body_json(response).await, replay_body);

    for access in [token(&legit, "access_token"), token(&laptop, "access_token")] {
        let response = get_auth(t.app.clone(), "/api/v1/auth/me", &access).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
    let successor = json!({ "refresh_token": token(&legit, "refresh_token") });
    let response = post_json(t.app.clone(), "/api/v1/auth/refresh", successor).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_refresh_token_is_reported_as_expired() {
    let t = common::build_test_app();
    let issued = common::register(t.app.clone(), "late@example.com").await;
    let user_id = issued["user"]["id"].as_i64().unwrap();

    let entry = t.store.ledger_for(user_id).remove(0);
    t.store
        .set_ledger_expiry(entry.id, Utc::now() - Duration::minutes(1))
        .unwrap();

    let body = json!({ "refresh_token": token(&issued, "refresh_token") });
    let response = post_json(t.app.clone(), "/api/v1/auth/refresh", body).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "REFRESH_TOKEN_EXPIRED");
}

// ---------------------------------------------------------------------------
// Logout
// ---------------------------------------------------------------------------

#[tokio::test]
async fn logout_ends_only_the_current_session() {
    let t = common::build_test_app();
    let first = common::register(t.app.clone(), "leaver@example.com").await;
    let second = common::login(t.app.clone(), "leaver@example.com", Some("tablet")).await;
    let user_id = first["user"]["id"].as_i64().unwrap();

    let response = post_auth(
        t.app.clone(),
        "/api/v1/auth/logout",
        &token(&first, "access_token"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = get_auth(t.app.clone(), "/api/v1/auth/me", &token(&first, "access_token")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = json!({ "refresh_token": token(&first, "refresh_token") });
    let response = post_json(t.app.clone(), "/api/v1/auth/refresh", body).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "INVALID_REFRESH_TOKEN");

    let response =
        get_auth(t.app.clone(), "/api/v1/auth/me", &token(&second, "access_token")).await;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(t.store.sessions_for(user_id).len(), 1);
    assert!(t
        .store
        .ledger_for(user_id)
        .iter()
        .any(|e| e.status == LedgerStatus::Revoked && e.session_id.is_none()));
}
