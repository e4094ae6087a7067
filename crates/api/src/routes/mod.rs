pub mod ads;
pub mod auth;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /auth
///     POST /login                     login
///     POST /register                  register
///     POST /refresh                   refresh
///     POST /logout                    logout (requires auth)
///     GET  /me                        current user (requires auth)
///
/// /ads
///     GET  /configs                   list active configs (?ad_type=)
///     POST /configs                   upsert config (admin)
///     PUT  /configs/{id}/disable      disable config (admin)
///     GET  /serve/{ad_type}           pick an ad (optional auth)
///     POST /track                     record an ad event (requires auth)
///     GET  /analytics                 aggregated counts (admin)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/ads", ads::router())
}
