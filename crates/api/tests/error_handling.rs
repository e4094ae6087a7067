//! Tests for `AppError` → HTTP response mapping.
//!
//! These call `IntoResponse` directly on `AppError` values; no server needed.

use adpass_api::error::AppError;
use adpass_core::auth::AuthError;
use adpass_core::error::CoreError;
use adpass_core::store::StoreError;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;

/// Helper: convert an `AppError` into its status code and parsed JSON body.
async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

#[tokio::test]
async fn not_found_error_returns_404() {
    let err = AppError::Core(CoreError::NotFound {
        entity: "AdConfig",
        id: 42,
    });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "AdConfig with id 42 not found");
}

#[tokio::test]
async fn refresh_failures_share_one_body() {
    let (status, reused) = error_to_response(AuthError::RefreshTokenReused.into()).await;
    let (_, invalid) = error_to_response(AuthError::InvalidRefreshToken.into()).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(reused, invalid);
    assert_eq!(reused["code"], "INVALID_REFRESH_TOKEN");
}

#[tokio::test]
async fn expired_refresh_has_its_own_code() {
    let (status, json) = error_to_response(AuthError::RefreshTokenExpired.into()).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "REFRESH_TOKEN_EXPIRED");
}

#[tokio::test]
async fn persistence_failure_is_sanitized() {
    let err: AppError =
        AuthError::Persistence(StoreError::Backend("connection to 10.0.0.5 refused".into())).into();

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert_eq!(json["error"], "An internal error occurred");
}

#[tokio::test]
async fn unique_conflict_returns_409() {
    let err = AppError::Store(StoreError::Conflict("uq_users_email".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "CONFLICT");
}
