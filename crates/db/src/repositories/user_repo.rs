//! Repository for the `users` table.

use adpass_core::entitlement::SubscriptionState;
use adpass_core::store::NewUser;
use adpass_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::user::UserRow;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, email, external_id, password_hash, email_verified, role, \
                       subscription_state, subscription_expiry, created_at, updated_at";

pub struct UserRepo;

impl UserRepo {
    /// Insert a new free-tier user, returning the created row.
    pub async fn create(pool: &PgPool, input: &NewUser) -> Result<UserRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (email, external_id, password_hash, email_verified, role)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UserRow>(&query)
            .bind(&input.email)
            .bind(&input.external_id)
            .bind(&input.password_hash)
            .bind(input.email_verified)
            .bind(input.role.as_str())
            .fetch_one(pool)
            .await
    }

    /// Find a user by internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<UserRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, UserRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a user by email (case-sensitive).
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, UserRow>(&query)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Overwrite a user's subscription. Returns `false` if the user does not exist.
    pub async fn set_subscription(
        pool: &PgPool,
        id: DbId,
        state: SubscriptionState,
        expiry: Option<Timestamp>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users
             SET subscription_state = $2, subscription_expiry = $3, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(state.as_str())
        .bind(expiry)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
