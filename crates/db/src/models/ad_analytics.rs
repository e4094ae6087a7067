//! `ad_analytics_events` rows and aggregate buckets.

use adpass_core::ads::{AdAnalyticsEvent, AnalyticsBucket};
use adpass_core::store::StoreError;
use adpass_core::types::{DbId, Timestamp};
use sqlx::FromRow;

use super::parse_column;

#[derive(Debug, Clone, FromRow)]
pub struct AdAnalyticsRow {
    pub id: DbId,
    pub user_id: Option<DbId>,
    pub ad_type: String,
    pub action: String,
    pub ad_network_id: String,
    pub occurred_at: Timestamp,
}

impl TryFrom<AdAnalyticsRow> for AdAnalyticsEvent {
    type Error = StoreError;

    fn try_from(row: AdAnalyticsRow) -> Result<Self, Self::Error> {
        Ok(AdAnalyticsEvent {
            id: row.id,
            user_id: row.user_id,
            ad_type: parse_column("ad_analytics_events.ad_type", &row.ad_type)?,
            action: parse_column("ad_analytics_events.action", &row.action)?,
            ad_network_id: row.ad_network_id,
            timestamp: row.occurred_at,
        })
    }
}

/// One `GROUP BY ad_type, action` result row.
#[derive(Debug, Clone, FromRow)]
pub struct AnalyticsCountRow {
    pub ad_type: String,
    pub action: String,
    pub count: i64,
}

impl TryFrom<AnalyticsCountRow> for AnalyticsBucket {
    type Error = StoreError;

    fn try_from(row: AnalyticsCountRow) -> Result<Self, Self::Error> {
        Ok(AnalyticsBucket {
            ad_type: parse_column("ad_analytics_events.ad_type", &row.ad_type)?,
            action: parse_column("ad_analytics_events.action", &row.action)?,
            count: row.count,
        })
    }
}
