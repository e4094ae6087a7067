//! `sessions` rows.

use adpass_core::store::SessionRecord;
use adpass_core::types::{DbId, Timestamp};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub id: DbId,
    pub user_id: DbId,
    pub device_id: Option<String>,
    pub access_token_hash: String,
    pub expires_at: Timestamp,
    pub is_revoked: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<SessionRow> for SessionRecord {
    fn from(row: SessionRow) -> Self {
        SessionRecord {
            id: row.id,
            user_id: row.user_id,
            device_id: row.device_id,
            access_token_hash: row.access_token_hash,
            expires_at: row.expires_at,
            is_revoked: row.is_revoked,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
