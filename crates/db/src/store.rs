//! [`PgStore`]: the PostgreSQL implementation of the core store traits.

use adpass_core::ads::{
    AdAnalyticsEvent, AdConfig, AdType, AnalyticsBucket, NewAdAnalyticsEvent, UpsertAdConfig,
};
use adpass_core::store::{
    AdConfigStore, AnalyticsSink, CredentialStore, LedgerEntry, NewLedgerEntry, NewSession,
    NewUser, RefreshLedger, Revocation, RotationRequest, RotationWrite, SessionRecord,
    SessionStore, Store, StoreError, UserRecord, UserStore,
};
use adpass_core::types::{DbId, Timestamp};
use async_trait::async_trait;

use crate::models::refresh_token::RotateOutcome;
use crate::repositories::{
    AdAnalyticsRepo, AdConfigRepo, RefreshTokenRepo, SessionRepo, UserRepo,
};
use crate::DbPool;

/// Store backed by a sqlx connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// Map a sqlx error onto [`StoreError`].
///
/// Unique violations (SQLSTATE 23505) on `uq_` constraints become
/// [`StoreError::Conflict`] naming the constraint.
pub fn store_err(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            let constraint = db_err.constraint().unwrap_or("unknown");
            if constraint.starts_with("uq_") {
                return StoreError::Conflict(constraint.to_string());
            }
        }
    }
    StoreError::Backend(err.to_string())
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user(&self, id: DbId) -> Result<Option<UserRecord>, StoreError> {
        UserRepo::find_by_id(&self.pool, id)
            .await
            .map_err(store_err)?
            .map(UserRecord::try_from)
            .transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        UserRepo::find_by_email(&self.pool, email)
            .await
            .map_err(store_err)?
            .map(UserRecord::try_from)
            .transpose()
    }

    async fn create_user(&self, input: &NewUser) -> Result<UserRecord, StoreError> {
        UserRepo::create(&self.pool, input)
            .await
            .map_err(store_err)?
            .try_into()
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn find_session_by_access_hash(
        &self,
        access_token_hash: &str,
    ) -> Result<Option<SessionRecord>, StoreError> {
        Ok(SessionRepo::find_by_access_hash(&self.pool, access_token_hash)
            .await
            .map_err(store_err)?
            .map(SessionRecord::from))
    }
}

#[async_trait]
impl RefreshLedger for PgStore {
    async fn find_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<LedgerEntry>, StoreError> {
        RefreshTokenRepo::find_by_token_hash(&self.pool, token_hash)
            .await
            .map_err(store_err)?
            .map(LedgerEntry::try_from)
            .transpose()
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn insert_pair(
        &self,
        session: &NewSession,
        entry: &NewLedgerEntry,
    ) -> Result<(SessionRecord, LedgerEntry), StoreError> {
        let (session, token) = SessionRepo::create_with_refresh_token(&self.pool, session, entry)
            .await
            .map_err(store_err)?;
        Ok((session.into(), token.try_into()?))
    }

    async fn rotate_pair(&self, request: &RotationRequest) -> Result<RotationWrite, StoreError> {
        let outcome = RefreshTokenRepo::rotate(&self.pool, request)
            .await
            .map_err(store_err)?;
        Ok(match outcome {
            RotateOutcome::Rotated { session, token } => RotationWrite::Rotated {
                session: session.into(),
                entry: token.try_into()?,
            },
            RotateOutcome::AlreadySpent => RotationWrite::AlreadySpent,
            RotateOutcome::NotLive => RotationWrite::NotLive,
        })
    }

    async fn revoke_user(&self, user_id: DbId) -> Result<Revocation, StoreError> {
        let (sessions, ledger_entries) = SessionRepo::revoke_all_for_user(&self.pool, user_id)
            .await
            .map_err(store_err)?;
        Ok(Revocation {
            sessions,
            ledger_entries,
        })
    }

    async fn end_session(&self, session_id: DbId) -> Result<bool, StoreError> {
        SessionRepo::delete_with_tokens(&self.pool, session_id)
            .await
            .map_err(store_err)
    }

    async fn purge_expired(&self, now: Timestamp) -> Result<u64, StoreError> {
        SessionRepo::cleanup_expired(&self.pool, now)
            .await
            .map_err(store_err)
    }
}

#[async_trait]
impl AdConfigStore for PgStore {
    async fn list_active(&self, ad_type: Option<AdType>) -> Result<Vec<AdConfig>, StoreError> {
        AdConfigRepo::list_active(&self.pool, ad_type)
            .await
            .map_err(store_err)?
            .into_iter()
            .map(AdConfig::try_from)
            .collect()
    }

    async fn upsert(&self, input: &UpsertAdConfig) -> Result<AdConfig, StoreError> {
        AdConfigRepo::upsert(&self.pool, input)
            .await
            .map_err(store_err)?
            .try_into()
    }

    async fn disable(&self, id: DbId) -> Result<Option<AdConfig>, StoreError> {
        AdConfigRepo::disable(&self.pool, id)
            .await
            .map_err(store_err)?
            .map(AdConfig::try_from)
            .transpose()
    }
}

#[async_trait]
impl AnalyticsSink for PgStore {
    async fn append(&self, event: &NewAdAnalyticsEvent) -> Result<AdAnalyticsEvent, StoreError> {
        AdAnalyticsRepo::insert(&self.pool, event)
            .await
            .map_err(store_err)?
            .try_into()
    }

    async fn aggregate(
        &self,
        start: Option<Timestamp>,
        end: Option<Timestamp>,
    ) -> Result<Vec<AnalyticsBucket>, StoreError> {
        AdAnalyticsRepo::aggregate(&self.pool, start, end)
            .await
            .map_err(store_err)?
            .into_iter()
            .map(AnalyticsBucket::try_from)
            .collect()
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool).await.map_err(store_err)
    }
}
