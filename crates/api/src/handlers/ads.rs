//! Handlers for the `/ads` resource.

use adpass_core::ads::{
    AdAction, AdConfig, AdPlacement, AdType, AnalyticsBucket, UpsertAdConfig,
};
use adpass_core::error::CoreError;
use adpass_core::types::{DbId, Timestamp};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::validate_body;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::{AuthUser, OptionalAuthUser};
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Query parameters for `GET /ads/configs`.
#[derive(Debug, Deserialize)]
pub struct ConfigListParams {
    pub ad_type: Option<AdType>,
}

/// Request body for `POST /ads/track`.
#[derive(Debug, Deserialize, Validate)]
pub struct TrackRequest {
    pub ad_type: AdType,
    pub action: AdAction,
    #[validate(length(min = 1, max = 128))]
    pub ad_network_id: String,
}

/// Query parameters for `GET /ads/analytics`.
///
/// Each bound accepts an RFC 3339 timestamp or a plain `YYYY-MM-DD` date.
/// A date as `end_date` covers that whole day.
#[derive(Debug, Deserialize)]
pub struct AnalyticsParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Response body for `GET /ads/serve/{ad_type}`.
#[derive(Debug, Serialize)]
pub struct ServeResponse {
    pub data: Option<AdPlacement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/ads/configs?ad_type=
pub async fn list_configs(
    State(state): State<AppState>,
    Query(params): Query<ConfigListParams>,
) -> AppResult<Json<DataResponse<Vec<AdConfig>>>> {
    let configs = state.ads.list_configs(params.ad_type).await?;
    Ok(Json(DataResponse { data: configs }))
}

/// POST /api/v1/ads/configs (admin)
///
/// Insert or update the config for `(ad_type, ad_network_id)`.
pub async fn upsert_config(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(input): Json<UpsertAdConfig>,
) -> AppResult<Json<DataResponse<AdConfig>>> {
    validate_body(&input)?;
    let config = state.ads.upsert_config(&input).await?;
    tracing::debug!(admin_id = admin.user_id, config_id = config.id, "Config upsert by admin");
    Ok(Json(DataResponse { data: config }))
}

/// PUT /api/v1/ads/configs/{id}/disable (admin)
pub async fn disable_config(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<AdConfig>>> {
    let config = state
        .ads
        .disable_config(id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "AdConfig",
            id,
        })?;
    Ok(Json(DataResponse { data: config }))
}

/// GET /api/v1/ads/serve/{ad_type}
///
/// Anonymous callers are served; signed-in callers only while restricted.
pub async fn serve_ad(
    State(state): State<AppState>,
    OptionalAuthUser(user): OptionalAuthUser,
    Path(ad_type): Path<String>,
) -> AppResult<Json<ServeResponse>> {
    let ad_type: AdType = ad_type.to_ascii_uppercase().parse()?;
    let placement = state.ads.select_ad(ad_type, user.map(|u| u.user_id)).await;

    let message = placement.is_none().then_some("No ad available");
    Ok(Json(ServeResponse {
        data: placement,
        message,
    }))
}

/// POST /api/v1/ads/track
///
/// Best-effort: responds 204 even when the event could not be stored.
pub async fn track_event(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(input): Json<TrackRequest>,
) -> AppResult<StatusCode> {
    validate_body(&input)?;
    state
        .ads
        .record_event(
            Some(auth_user.user_id),
            input.ad_type,
            input.action,
            &input.ad_network_id,
        )
        .await;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/ads/analytics?start_date=&end_date= (admin)
pub async fn analytics(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(params): Query<AnalyticsParams>,
) -> AppResult<Json<DataResponse<Vec<AnalyticsBucket>>>> {
    let start = params
        .start_date
        .as_deref()
        .map(|s| parse_bound(s, Bound::Start))
        .transpose()?;
    let end = params
        .end_date
        .as_deref()
        .map(|s| parse_bound(s, Bound::End))
        .transpose()?;

    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(AppError::BadRequest(
                "start_date must not be after end_date".into(),
            ));
        }
    }

    let buckets = state.ads.aggregate_analytics(start, end).await?;
    Ok(Json(DataResponse { data: buckets }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Bound {
    Start,
    End,
}

/// Parse an analytics window bound. Dates expand to the first (start) or
/// last (end) microsecond of that UTC day.
fn parse_bound(raw: &str, bound: Bound) -> Result<Timestamp, AppError> {
    if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        AppError::BadRequest(format!(
            "Invalid date '{raw}': expected YYYY-MM-DD or an RFC 3339 timestamp"
        ))
    })?;
    let start_of_day = date.and_time(NaiveTime::MIN).and_utc();
    Ok(match bound {
        Bound::Start => start_of_day,
        Bound::End => start_of_day + Duration::days(1) - Duration::microseconds(1),
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn date_bounds_cover_whole_day() {
        let start = parse_bound("2026-03-01", Bound::Start).unwrap();
        let end = parse_bound("2026-03-01", Bound::End).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
        assert!(end > Utc.with_ymd_and_hms(2026, 3, 1, 23, 59, 59).unwrap());
        assert!(end < Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn rfc3339_is_used_verbatim() {
        let ts = parse_bound("2026-03-01T12:30:00+02:00", Bound::End).unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2026, 3, 1, 10, 30, 0).unwrap());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_bound("yesterday", Bound::Start).is_err());
    }
}
