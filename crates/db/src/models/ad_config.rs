//! `ad_configs` rows.

use adpass_core::ads::AdConfig;
use adpass_core::store::StoreError;
use adpass_core::types::{DbId, Timestamp};
use sqlx::FromRow;

use super::parse_column;

#[derive(Debug, Clone, FromRow)]
pub struct AdConfigRow {
    pub id: DbId,
    pub ad_type: String,
    pub ad_network_id: String,
    pub is_active: bool,
    pub display_frequency: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<AdConfigRow> for AdConfig {
    type Error = StoreError;

    fn try_from(row: AdConfigRow) -> Result<Self, Self::Error> {
        Ok(AdConfig {
            id: row.id,
            ad_type: parse_column("ad_configs.ad_type", &row.ad_type)?,
            ad_network_id: row.ad_network_id,
            is_active: row.is_active,
            display_frequency: row.display_frequency,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
