//! Repository for the `ad_configs` table.

use adpass_core::ads::{AdType, UpsertAdConfig, DEFAULT_DISPLAY_FREQUENCY};
use adpass_core::types::DbId;
use sqlx::PgPool;

use crate::models::ad_config::AdConfigRow;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str =
    "id, ad_type, ad_network_id, is_active, display_frequency, created_at, updated_at";

pub struct AdConfigRepo;

impl AdConfigRepo {
    /// Active configs, newest first, optionally restricted to one type.
    pub async fn list_active(
        pool: &PgPool,
        ad_type: Option<AdType>,
    ) -> Result<Vec<AdConfigRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM ad_configs
             WHERE is_active = true AND ($1::TEXT IS NULL OR ad_type = $1)
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, AdConfigRow>(&query)
            .bind(ad_type.map(AdType::as_str))
            .fetch_all(pool)
            .await
    }

    /// Insert or update on `(ad_type, ad_network_id)`.
    ///
    /// Omitted fields keep their stored value on update.
    pub async fn upsert(pool: &PgPool, input: &UpsertAdConfig) -> Result<AdConfigRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO ad_configs (ad_type, ad_network_id, is_active, display_frequency)
             VALUES ($1, $2, COALESCE($3, true), COALESCE($4, $5))
             ON CONFLICT (ad_type, ad_network_id) DO UPDATE SET
                 is_active = COALESCE($3, ad_configs.is_active),
                 display_frequency = COALESCE($4, ad_configs.display_frequency),
                 updated_at = NOW()
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AdConfigRow>(&query)
            .bind(input.ad_type.as_str())
            .bind(&input.ad_network_id)
            .bind(input.is_active)
            .bind(input.display_frequency)
            .bind(DEFAULT_DISPLAY_FREQUENCY)
            .fetch_one(pool)
            .await
    }

    /// Deactivate a config, returning it, or `None` if the id is unknown.
    pub async fn disable(pool: &PgPool, id: DbId) -> Result<Option<AdConfigRow>, sqlx::Error> {
        let query = format!(
            "UPDATE ad_configs SET is_active = false, updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AdConfigRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
