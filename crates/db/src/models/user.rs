//! `users` rows.

use adpass_core::store::{StoreError, UserRecord};
use adpass_core::types::{DbId, Timestamp};
use sqlx::FromRow;

use super::parse_column;

/// Full row from the `users` table.
///
/// Contains the password hash -- never serialize this to API responses.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: DbId,
    pub email: String,
    pub external_id: Option<String>,
    pub password_hash: Option<String>,
    pub email_verified: bool,
    pub role: String,
    pub subscription_state: String,
    pub subscription_expiry: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(UserRecord {
            id: row.id,
            email: row.email,
            external_id: row.external_id,
            password_hash: row.password_hash,
            email_verified: row.email_verified,
            role: parse_column("users.role", &row.role)?,
            subscription_state: parse_column("users.subscription_state", &row.subscription_state)?,
            subscription_expiry: row.subscription_expiry,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
