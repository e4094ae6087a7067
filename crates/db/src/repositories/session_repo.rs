//! Repository for the `sessions` table.
//!
//! Session writes always move together with the session's refresh tokens, so
//! the mutating methods here run a transaction spanning both tables.

use adpass_core::store::{NewLedgerEntry, NewSession};
use adpass_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::refresh_token::RefreshTokenRow;
use crate::models::session::SessionRow;
use crate::repositories::refresh_token_repo;

/// Column list shared across queries to avoid repetition.
pub(crate) const COLUMNS: &str = "id, user_id, device_id, access_token_hash, expires_at, \
                                  is_revoked, created_at, updated_at";

pub struct SessionRepo;

impl SessionRepo {
    /// Insert a session together with its first refresh token.
    ///
    /// When the session names a device, earlier unrevoked sessions of the
    /// same user on that device are revoked first, along with their live
    /// tokens.
    pub async fn create_with_refresh_token(
        pool: &PgPool,
        session: &NewSession,
        token: &NewLedgerEntry,
    ) -> Result<(SessionRow, RefreshTokenRow), sqlx::Error> {
        let mut tx = pool.begin().await?;

        if let Some(device_id) = &session.device_id {
            let replaced: Vec<DbId> = sqlx::query_scalar(
                "UPDATE sessions SET is_revoked = true, updated_at = NOW()
                 WHERE user_id = $1 AND device_id = $2 AND is_revoked = false
                 RETURNING id",
            )
            .bind(session.user_id)
            .bind(device_id)
            .fetch_all(&mut *tx)
            .await?;

            if !replaced.is_empty() {
                sqlx::query(
                    "UPDATE refresh_tokens SET status = 'REVOKED'
                     WHERE session_id = ANY($1) AND status = 'LIVE'",
                )
                .bind(&replaced)
                .execute(&mut *tx)
                .await?;
                tracing::debug!(
                    user_id = session.user_id,
                    device_id = %device_id,
                    replaced = replaced.len(),
                    "Replaced earlier sessions on device"
                );
            }
        }

        let query = format!(
            "INSERT INTO sessions (user_id, device_id, access_token_hash, expires_at, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $5)
             RETURNING {COLUMNS}"
        );
        let created = sqlx::query_as::<_, SessionRow>(&query)
            .bind(session.user_id)
            .bind(&session.device_id)
            .bind(&session.access_token_hash)
            .bind(session.expires_at)
            .bind(session.created_at)
            .fetch_one(&mut *tx)
            .await?;

        let token = refresh_token_repo::insert(&mut tx, token, created.id).await?;

        tx.commit().await?;
        Ok((created, token))
    }

    /// Find the session bound to an access-token hash, revoked or not.
    pub async fn find_by_access_hash(
        pool: &PgPool,
        access_token_hash: &str,
    ) -> Result<Option<SessionRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sessions WHERE access_token_hash = $1");
        sqlx::query_as::<_, SessionRow>(&query)
            .bind(access_token_hash)
            .fetch_optional(pool)
            .await
    }

    /// Revoke every session and every live refresh token of a user.
    ///
    /// Returns `(sessions, tokens)` revoked.
    pub async fn revoke_all_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<(u64, u64), sqlx::Error> {
        let mut tx = pool.begin().await?;

        let sessions = sqlx::query(
            "UPDATE sessions SET is_revoked = true, updated_at = NOW()
             WHERE user_id = $1 AND is_revoked = false",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let tokens = sqlx::query(
            "UPDATE refresh_tokens SET status = 'REVOKED'
             WHERE user_id = $1 AND status = 'LIVE'",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        Ok((sessions, tokens))
    }

    /// Delete a session and revoke its live refresh tokens. The tokens stay
    /// in the ledger with `session_id` cleared by the foreign key.
    ///
    /// Returns `true` if the session existed.
    pub async fn delete_with_tokens(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            "UPDATE refresh_tokens SET status = 'REVOKED'
             WHERE session_id = $1 AND status = 'LIVE'",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let deleted = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted > 0)
    }

    /// Delete revoked or expired sessions and refresh tokens past their
    /// expiry. Returns the total count of deleted rows.
    pub async fn cleanup_expired(pool: &PgPool, now: Timestamp) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let tokens = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let sessions =
            sqlx::query("DELETE FROM sessions WHERE expires_at <= $1 OR is_revoked = true")
                .bind(now)
                .execute(&mut *tx)
                .await?
                .rows_affected();

        tx.commit().await?;
        Ok(tokens + sessions)
    }
}
