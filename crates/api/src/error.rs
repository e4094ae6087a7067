use adpass_core::auth::AuthError;
use adpass_core::error::CoreError;
use adpass_core::store::StoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps the domain error types and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `adpass_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A credential issuance or rotation failure.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A storage failure outside the auth flows.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    internal()
                }
            },

            AppError::Auth(auth) => classify_auth_error(auth),
            AppError::Store(store) => classify_store_error(store),

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

/// Classify an auth failure.
///
/// Replay of a spent refresh token answers exactly like an unknown one.
fn classify_auth_error(err: &AuthError) -> (StatusCode, &'static str, String) {
    match err {
        AuthError::InvalidCredentials => (
            StatusCode::UNAUTHORIZED,
            "INVALID_CREDENTIALS",
            "Invalid email or password".to_string(),
        ),
        AuthError::InvalidAccessToken => (
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "Invalid or expired token".to_string(),
        ),
        AuthError::InvalidRefreshToken | AuthError::RefreshTokenReused => (
            StatusCode::UNAUTHORIZED,
            "INVALID_REFRESH_TOKEN",
            "Invalid refresh token".to_string(),
        ),
        AuthError::RefreshTokenExpired => (
            StatusCode::UNAUTHORIZED,
            "REFRESH_TOKEN_EXPIRED",
            "Refresh token has expired".to_string(),
        ),
        AuthError::SessionNotFound => (
            StatusCode::UNAUTHORIZED,
            "SESSION_NOT_FOUND",
            "Session not found or revoked".to_string(),
        ),
        AuthError::TokenMinting(msg) => {
            tracing::error!(error = %msg, "Token minting failed");
            internal()
        }
        AuthError::Persistence(store) => classify_store_error(store),
    }
}

/// Classify a store error.
///
/// - Unique constraint conflicts map to 409.
/// - Everything else maps to 500 with a sanitized message.
fn classify_store_error(err: &StoreError) -> (StatusCode, &'static str, String) {
    match err {
        StoreError::Conflict(constraint) => (
            StatusCode::CONFLICT,
            "CONFLICT",
            format!("Duplicate value violates unique constraint: {constraint}"),
        ),
        StoreError::Corrupt(_) | StoreError::Backend(_) => {
            tracing::error!(error = %err, "Store error");
            internal()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reused_and_invalid_refresh_are_indistinguishable() {
        assert_eq!(
            classify_auth_error(&AuthError::RefreshTokenReused),
            classify_auth_error(&AuthError::InvalidRefreshToken)
        );
    }

    #[test]
    fn backend_details_are_not_leaked() {
        let (status, code, message) =
            classify_store_error(&StoreError::Backend("password=hunter2".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(code, "INTERNAL_ERROR");
        assert!(!message.contains("hunter2"));
    }

    #[test]
    fn conflicts_map_to_409() {
        let (status, code, _) = classify_store_error(&StoreError::Conflict("uq_users_email".into()));
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(code, "CONFLICT");
    }
}
