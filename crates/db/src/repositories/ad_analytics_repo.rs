//! Repository for the append-only `ad_analytics_events` table.

use adpass_core::ads::NewAdAnalyticsEvent;
use adpass_core::types::Timestamp;
use sqlx::PgPool;

use crate::models::ad_analytics::{AdAnalyticsRow, AnalyticsCountRow};

const COLUMNS: &str = "id, user_id, ad_type, action, ad_network_id, occurred_at";

pub struct AdAnalyticsRepo;

impl AdAnalyticsRepo {
    pub async fn insert(
        pool: &PgPool,
        event: &NewAdAnalyticsEvent,
    ) -> Result<AdAnalyticsRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO ad_analytics_events (user_id, ad_type, action, ad_network_id, occurred_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AdAnalyticsRow>(&query)
            .bind(event.user_id)
            .bind(event.ad_type.as_str())
            .bind(event.action.as_str())
            .bind(&event.ad_network_id)
            .bind(event.timestamp)
            .fetch_one(pool)
            .await
    }

    /// Count events per `(ad_type, action)`; both bounds are inclusive.
    pub async fn aggregate(
        pool: &PgPool,
        start: Option<Timestamp>,
        end: Option<Timestamp>,
    ) -> Result<Vec<AnalyticsCountRow>, sqlx::Error> {
        sqlx::query_as::<_, AnalyticsCountRow>(
            "SELECT ad_type, action, COUNT(*) AS count
             FROM ad_analytics_events
             WHERE ($1::TIMESTAMPTZ IS NULL OR occurred_at >= $1)
               AND ($2::TIMESTAMPTZ IS NULL OR occurred_at <= $2)
             GROUP BY ad_type, action
             ORDER BY ad_type, action",
        )
        .bind(start)
        .bind(end)
        .fetch_all(pool)
        .await
    }
}
