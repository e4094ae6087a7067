//! Repository for the `refresh_tokens` table.

use adpass_core::store::{NewLedgerEntry, RotationRequest};
use adpass_core::types::DbId;
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::refresh_token::{RefreshTokenRow, RotateOutcome};
use crate::models::session::SessionRow;
use crate::repositories::session_repo;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, session_id, parent_id, token_hash, status, \
                       expires_at, created_at, spent_at";

pub struct RefreshTokenRepo;

impl RefreshTokenRepo {
    /// Find a token by hash, in any status.
    pub async fn find_by_token_hash(
        pool: &PgPool,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM refresh_tokens WHERE token_hash = $1");
        sqlx::query_as::<_, RefreshTokenRow>(&query)
            .bind(token_hash)
            .fetch_optional(pool)
            .await
    }

    /// All tokens of a user, oldest first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<RefreshTokenRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM refresh_tokens WHERE user_id = $1 ORDER BY id");
        sqlx::query_as::<_, RefreshTokenRow>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Spend the presented token and insert its successor.
    ///
    /// The `status = 'LIVE'` guard on the first UPDATE makes concurrent
    /// rotations of one token serialize on its row lock: the second one sees
    /// `SPENT` after the first commits and reports [`RotateOutcome::AlreadySpent`].
    pub async fn rotate(
        pool: &PgPool,
        request: &RotationRequest,
    ) -> Result<RotateOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let spent: Option<DbId> = sqlx::query_scalar(
            "UPDATE refresh_tokens SET status = 'SPENT', spent_at = NOW()
             WHERE id = $1 AND status = 'LIVE'
             RETURNING id",
        )
        .bind(request.presented_id)
        .fetch_optional(&mut *tx)
        .await?;

        if spent.is_none() {
            let status: Option<String> =
                sqlx::query_scalar("SELECT status FROM refresh_tokens WHERE id = $1")
                    .bind(request.presented_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            tx.rollback().await?;
            return Ok(match status.as_deref() {
                Some("SPENT") => RotateOutcome::AlreadySpent,
                _ => RotateOutcome::NotLive,
            });
        }

        let query = format!(
            "UPDATE sessions
             SET access_token_hash = $2, expires_at = $3, updated_at = NOW()
             WHERE id = $1 AND is_revoked = false
             RETURNING {}",
            session_repo::COLUMNS
        );
        let session = sqlx::query_as::<_, SessionRow>(&query)
            .bind(request.session_id)
            .bind(&request.access_token_hash)
            .bind(request.session_expires_at)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(session) = session else {
            tx.rollback().await?;
            return Ok(RotateOutcome::NotLive);
        };

        let token = insert(&mut tx, &request.successor, session.id).await?;

        tx.commit().await?;
        Ok(RotateOutcome::Rotated { session, token })
    }
}

/// Insert a `LIVE` token owned by `session_id` inside an open transaction.
pub(crate) async fn insert(
    tx: &mut Transaction<'_, Postgres>,
    input: &NewLedgerEntry,
    session_id: DbId,
) -> Result<RefreshTokenRow, sqlx::Error> {
    let query = format!(
        "INSERT INTO refresh_tokens (user_id, session_id, parent_id, token_hash, expires_at, created_at)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, RefreshTokenRow>(&query)
        .bind(input.user_id)
        .bind(session_id)
        .bind(input.parent_id)
        .bind(&input.token_hash)
        .bind(input.expires_at)
        .bind(input.created_at)
        .fetch_one(&mut **tx)
        .await
}
