//! Persistence seams.
//!
//! Every component in this crate is constructed with `Arc<dyn Trait>` handles
//! to the traits below rather than a concrete database. `adpass-db` provides
//! the PostgreSQL implementation; [`crate::memory::MemoryStore`] provides an
//! in-process one.
//!
//! Operations that touch both sessions and the refresh ledger live on
//! [`CredentialStore`] because each must commit as a single unit.

use async_trait::async_trait;

use crate::ads::{
    AdAnalyticsEvent, AdConfig, AdType, AnalyticsBucket, NewAdAnalyticsEvent, UpsertAdConfig,
};
use crate::entitlement::SubscriptionState;
use crate::roles::UserRole;
use crate::types::{define_text_enum, DbId, Timestamp};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure reported by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("Duplicate value: {0}")]
    Conflict(String),

    /// A stored value could not be mapped back onto the domain model.
    #[error("Stored value is invalid: {0}")]
    Corrupt(String),

    /// Any other backend failure (connection loss, aborted transaction, ...).
    #[error("Storage backend failure: {0}")]
    Backend(String),
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// A user account with its entitlement fields.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: DbId,
    pub email: String,
    /// Identity id from a federated provider, if the account was linked.
    pub external_id: Option<String>,
    /// Argon2 PHC string; `None` for federated-only accounts.
    pub password_hash: Option<String>,
    pub email_verified: bool,
    pub role: UserRole,
    pub subscription_state: SubscriptionState,
    pub subscription_expiry: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Input for registering a user. New accounts always start on the free tier.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub external_id: Option<String>,
    pub password_hash: Option<String>,
    pub email_verified: bool,
    pub role: UserRole,
}

// ---------------------------------------------------------------------------
// Sessions and the refresh ledger
// ---------------------------------------------------------------------------

/// One login on one device.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: DbId,
    pub user_id: DbId,
    pub device_id: Option<String>,
    /// SHA-256 of the access token currently bound to this session.
    pub access_token_hash: String,
    pub expires_at: Timestamp,
    pub is_revoked: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl SessionRecord {
    /// A session authorizes requests while it is unrevoked and unexpired.
    pub fn is_usable_at(&self, now: Timestamp) -> bool {
        !self.is_revoked && self.expires_at > now
    }
}

/// Input for a new session row.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: DbId,
    pub device_id: Option<String>,
    pub access_token_hash: String,
    pub expires_at: Timestamp,
    pub created_at: Timestamp,
}

define_text_enum! {
    /// Lifecycle of one refresh-ledger entry.
    ///
    /// `Live` is the only state that can be exchanged. `Spent` entries were
    /// exchanged by a rotation; presenting one again is treated as theft.
    /// `Revoked` entries were invalidated by logout or theft detection.
    LedgerStatus {
        Live = "LIVE",
        Spent = "SPENT",
        Revoked = "REVOKED",
    }
}

/// One issued refresh credential.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub id: DbId,
    pub user_id: DbId,
    /// Session this credential refreshes. Cleared once the session is deleted.
    pub session_id: Option<DbId>,
    /// Entry this one replaced; `None` for the head created at login.
    pub parent_id: Option<DbId>,
    /// SHA-256 of the opaque token. The plaintext is never stored.
    pub token_hash: String,
    pub status: LedgerStatus,
    pub expires_at: Timestamp,
    pub created_at: Timestamp,
    pub spent_at: Option<Timestamp>,
}

/// Input for a new ledger entry. The owning session is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub user_id: DbId,
    pub parent_id: Option<DbId>,
    pub token_hash: String,
    pub expires_at: Timestamp,
    pub created_at: Timestamp,
}

/// Everything a rotation writes in its transaction.
#[derive(Debug, Clone)]
pub struct RotationRequest {
    /// Entry being exchanged; must still be `Live` when the write happens.
    pub presented_id: DbId,
    pub session_id: DbId,
    pub successor: NewLedgerEntry,
    pub access_token_hash: String,
    pub session_expires_at: Timestamp,
}

/// Outcome of [`CredentialStore::rotate_pair`].
#[derive(Debug, Clone)]
pub enum RotationWrite {
    /// The presented entry was marked spent and its successor inserted.
    Rotated {
        session: SessionRecord,
        entry: LedgerEntry,
    },
    /// Another rotation spent the entry first.
    AlreadySpent,
    /// The entry (or its session) was revoked before the write.
    NotLive,
}

/// Row counts touched by a user-wide revocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Revocation {
    pub sessions: u64,
    pub ledger_entries: u64,
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Read access to user accounts plus registration.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, id: DbId) -> Result<Option<UserRecord>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Insert a user on the free tier. Duplicate emails yield [`StoreError::Conflict`].
    async fn create_user(&self, input: &NewUser) -> Result<UserRecord, StoreError>;
}

/// Session lookups.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Find the session bound to an access-token hash, revoked or not.
    async fn find_session_by_access_hash(
        &self,
        access_token_hash: &str,
    ) -> Result<Option<SessionRecord>, StoreError>;
}

/// Refresh-ledger lookups.
#[async_trait]
pub trait RefreshLedger: Send + Sync {
    /// Find a ledger entry by token hash, in any status.
    async fn find_by_token_hash(&self, token_hash: &str)
        -> Result<Option<LedgerEntry>, StoreError>;
}

/// Writes spanning sessions and the refresh ledger. Each method is atomic.
#[async_trait]
pub trait CredentialStore: SessionStore + RefreshLedger {
    /// Insert a session and its first ledger entry together.
    ///
    /// When `session.device_id` is set, any earlier unrevoked session for the
    /// same (user, device) is revoked in the same transaction along with its
    /// live ledger entries.
    async fn insert_pair(
        &self,
        session: &NewSession,
        entry: &NewLedgerEntry,
    ) -> Result<(SessionRecord, LedgerEntry), StoreError>;

    /// Mark the presented entry spent, insert its successor, and rebind the
    /// session's access hash. Only one caller can win for a given entry.
    async fn rotate_pair(&self, request: &RotationRequest) -> Result<RotationWrite, StoreError>;

    /// Revoke every session and every live ledger entry belonging to a user.
    async fn revoke_user(&self, user_id: DbId) -> Result<Revocation, StoreError>;

    /// Delete a session and revoke its live ledger entries.
    ///
    /// Returns `false` when no such session exists.
    async fn end_session(&self, session_id: DbId) -> Result<bool, StoreError>;

    /// Delete revoked/expired sessions and ledger entries past their expiry.
    /// Returns the number of rows removed.
    async fn purge_expired(&self, now: Timestamp) -> Result<u64, StoreError>;
}

/// Ad placement configuration.
#[async_trait]
pub trait AdConfigStore: Send + Sync {
    /// Active configs, newest first, optionally filtered by type.
    async fn list_active(&self, ad_type: Option<AdType>) -> Result<Vec<AdConfig>, StoreError>;

    /// Insert or update the config keyed on `(ad_type, ad_network_id)`.
    async fn upsert(&self, input: &UpsertAdConfig) -> Result<AdConfig, StoreError>;

    /// Set `is_active = false`. Returns `None` if no config has that id.
    async fn disable(&self, id: DbId) -> Result<Option<AdConfig>, StoreError>;
}

/// Append-only ad analytics.
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn append(&self, event: &NewAdAnalyticsEvent) -> Result<AdAnalyticsEvent, StoreError>;

    /// Count events per `(ad_type, action)` within an inclusive window,
    /// ordered by ad type then action.
    async fn aggregate(
        &self,
        start: Option<Timestamp>,
        end: Option<Timestamp>,
    ) -> Result<Vec<AnalyticsBucket>, StoreError>;
}

/// A complete backend, as wired into the HTTP server.
#[async_trait]
pub trait Store: CredentialStore + UserStore + AdConfigStore + AnalyticsSink {
    /// Cheap liveness check used by the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;
}
