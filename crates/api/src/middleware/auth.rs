//! Access-token extractors for Axum handlers.

use adpass_core::error::CoreError;
use adpass_core::roles::UserRole;
use adpass_core::types::DbId;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::state::AppState;

/// Authenticated user extracted from a Bearer token in the `Authorization` header.
///
/// The token must verify and its session must still be live and bound to
/// this exact token, so logout, rotation and revocation cut access off
/// immediately rather than at token expiry.
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = user.user_id, role = %user.role, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user's internal database id (from `claims.sub`).
    pub user_id: DbId,
    pub role: UserRole,
    /// Session the presented token is bound to.
    pub session_id: DbId,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "Missing Authorization header".into(),
                ))
            })?;

        authenticate_header(auth_header, state).await
    }
}

/// Like [`AuthUser`], but a request without an `Authorization` header yields
/// `OptionalAuthUser(None)`. A header that is present but invalid is still
/// rejected.
#[derive(Debug, Clone)]
pub struct OptionalAuthUser(pub Option<AuthUser>);

impl FromRequestParts<AppState> for OptionalAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(header) = parts.headers.get("authorization") else {
            return Ok(OptionalAuthUser(None));
        };
        let header = header.to_str().map_err(|_| {
            AppError::Core(CoreError::Unauthorized(
                "Invalid Authorization header".into(),
            ))
        })?;

        Ok(OptionalAuthUser(Some(
            authenticate_header(header, state).await?,
        )))
    }
}

async fn authenticate_header(header: &str, state: &AppState) -> Result<AuthUser, AppError> {
    let token = header.strip_prefix("Bearer ").ok_or_else(|| {
        AppError::Core(CoreError::Unauthorized(
            "Invalid Authorization format. Expected: Bearer <token>".into(),
        ))
    })?;

    let authenticated = state.issuer.authenticate(token).await?;

    Ok(AuthUser {
        user_id: authenticated.claims.sub,
        role: authenticated.claims.role,
        session_id: authenticated.session.id,
    })
}
