//! Route definitions for the `/ads` resource.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::ads;
use crate::state::AppState;

/// Routes mounted at `/ads`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/configs", get(ads::list_configs).post(ads::upsert_config))
        .route("/configs/{id}/disable", put(ads::disable_config))
        .route("/serve/{ad_type}", get(ads::serve_ad))
        .route("/track", post(ads::track_event))
        .route("/analytics", get(ads::analytics))
}
