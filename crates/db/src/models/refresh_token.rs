//! `refresh_tokens` rows (the refresh ledger).

use adpass_core::store::{LedgerEntry, StoreError};
use adpass_core::types::{DbId, Timestamp};
use sqlx::FromRow;

use super::parse_column;
use super::session::SessionRow;

#[derive(Debug, Clone, FromRow)]
pub struct RefreshTokenRow {
    pub id: DbId,
    pub user_id: DbId,
    pub session_id: Option<DbId>,
    pub parent_id: Option<DbId>,
    pub token_hash: String,
    pub status: String,
    pub expires_at: Timestamp,
    pub created_at: Timestamp,
    pub spent_at: Option<Timestamp>,
}

impl TryFrom<RefreshTokenRow> for LedgerEntry {
    type Error = StoreError;

    fn try_from(row: RefreshTokenRow) -> Result<Self, Self::Error> {
        Ok(LedgerEntry {
            id: row.id,
            user_id: row.user_id,
            session_id: row.session_id,
            parent_id: row.parent_id,
            token_hash: row.token_hash,
            status: parse_column("refresh_tokens.status", &row.status)?,
            expires_at: row.expires_at,
            created_at: row.created_at,
            spent_at: row.spent_at,
        })
    }
}

/// Result of the rotation transaction in
/// [`RefreshTokenRepo::rotate`](crate::repositories::RefreshTokenRepo::rotate).
#[derive(Debug)]
pub enum RotateOutcome {
    Rotated {
        session: SessionRow,
        token: RefreshTokenRow,
    },
    AlreadySpent,
    NotLive,
}
