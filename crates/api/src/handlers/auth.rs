//! Handlers for the `/auth` resource (login, register, refresh, logout, me).

use adpass_core::auth::{AuthError, IssuedCredentials};
use adpass_core::entitlement::SubscriptionState;
use adpass_core::error::CoreError;
use adpass_core::roles::UserRole;
use adpass_core::store::NewUser;
use adpass_core::types::{DbId, Timestamp};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::validate_body;
use crate::auth::password::{
    hash_password, validate_password_strength, verify_dummy, verify_password,
};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/login`.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Stable client device identifier. A new login from the same device
    /// replaces that device's previous session.
    #[validate(length(min = 1, max = 255))]
    pub device_id: Option<String>,
}

/// Request body for `POST /auth/register`.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    pub password: String,
    #[validate(length(min = 1, max = 255))]
    pub device_id: Option<String>,
}

/// Request body for `POST /auth/refresh`.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Successful authentication response returned by login, register and refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub user: UserInfo,
}

/// Public user info embedded in [`AuthResponse`].
#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: DbId,
    pub email: String,
    pub email_verified: bool,
    pub role: UserRole,
    pub subscription_state: SubscriptionState,
}

impl From<IssuedCredentials> for AuthResponse {
    fn from(issued: IssuedCredentials) -> Self {
        Self {
            access_token: issued.access_token,
            refresh_token: issued.refresh_token,
            expires_in: issued.expires_in,
            user: UserInfo {
                id: issued.user.id,
                email: issued.user.email,
                email_verified: issued.user.email_verified,
                role: issued.user.role,
                subscription_state: issued.user.subscription_state,
            },
        }
    }
}

/// Response body for `GET /auth/me`.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: DbId,
    pub email: String,
    pub email_verified: bool,
    pub role: UserRole,
    pub subscription_state: SubscriptionState,
    pub subscription_expiry: Option<Timestamp>,
    /// Whether ads are served to this user right now.
    pub ads_restricted: bool,
    pub session_id: DbId,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/login
///
/// Authenticate with email + password. Returns access and refresh tokens.
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    validate_body(&input)?;
    let email = normalize_email(&input.email);

    let user = state.store.find_user_by_email(&email).await?;
    let Some((user, hash)) = user.and_then(|u| u.password_hash.clone().map(|h| (u, h))) else {
        // Unknown or password-less account: spend the same time as a real check.
        verify_dummy(&input.password);
        tracing::info!("Login failed: unknown email or no password set");
        return Err(AuthError::InvalidCredentials.into());
    };

    let password_valid = verify_password(&input.password, &hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
    if !password_valid {
        tracing::info!(user_id = user.id, "Login failed: wrong password");
        return Err(AuthError::InvalidCredentials.into());
    }

    let issued = state.issuer.issue(user.id, input.device_id.as_deref()).await?;
    Ok(Json(issued.into()))
}

/// POST /api/v1/auth/register
///
/// Create a free-tier account and sign it in. Returns 201 with tokens.
pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    validate_body(&input)?;
    validate_password_strength(&input.password, state.config.password_min_length)
        .map_err(|msg| AppError::Core(CoreError::Validation(msg)))?;

    let password_hash = hash_password(&input.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    let user = state
        .store
        .create_user(&NewUser {
            email: normalize_email(&input.email),
            external_id: None,
            password_hash: Some(password_hash),
            email_verified: false,
            role: UserRole::User,
        })
        .await?;
    tracing::info!(user_id = user.id, "User registered");

    let issued = state.issuer.issue(user.id, input.device_id.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(issued.into())))
}

/// POST /api/v1/auth/refresh
///
/// Exchange a refresh token for a new pair. Each refresh token works once.
pub async fn refresh(
    State(state): State<AppState>,
    Json(input): Json<RefreshRequest>,
) -> AppResult<Json<AuthResponse>> {
    let issued = state.rotation.rotate(&input.refresh_token).await?;
    Ok(Json(issued.into()))
}

/// POST /api/v1/auth/logout
///
/// End the caller's current session. Other devices stay signed in.
pub async fn logout(State(state): State<AppState>, auth_user: AuthUser) -> AppResult<StatusCode> {
    state.issuer.logout(auth_user.session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/auth/me
pub async fn me(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<DataResponse<MeResponse>>> {
    let user = state
        .store
        .find_user(auth_user.user_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "User",
            id: auth_user.user_id,
        })?;
    let ads_restricted = state.gate.is_restricted(user.id).await;

    Ok(Json(DataResponse {
        data: MeResponse {
            id: user.id,
            email: user.email,
            email_verified: user.email_verified,
            role: user.role,
            subscription_state: user.subscription_state,
            subscription_expiry: user.subscription_expiry,
            ads_restricted,
            session_id: auth_user.session_id,
        },
    }))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
