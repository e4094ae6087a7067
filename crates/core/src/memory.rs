//! In-process [`Store`] implementation.
//!
//! All state sits behind one mutex. Multi-row writes run against a copy of
//! the state that replaces the original only if every step succeeds, which
//! gives the same all-or-nothing behaviour as a database transaction.
//!
//! Backs the test suites of every crate in the workspace.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::ads::{
    AdAnalyticsEvent, AdConfig, AdType, AnalyticsBucket, NewAdAnalyticsEvent, UpsertAdConfig,
    DEFAULT_DISPLAY_FREQUENCY,
};
use crate::entitlement::SubscriptionState;
use crate::store::{
    AdConfigStore, AnalyticsSink, CredentialStore, LedgerEntry, LedgerStatus, NewLedgerEntry,
    NewSession, NewUser, RefreshLedger, Revocation, RotationRequest, RotationWrite,
    SessionRecord, SessionStore, Store, StoreError, UserRecord, UserStore,
};
use crate::types::{DbId, Timestamp};

#[derive(Debug, Clone, Default)]
struct Inner {
    next_id: DbId,
    users: BTreeMap<DbId, UserRecord>,
    sessions: BTreeMap<DbId, SessionRecord>,
    ledger: BTreeMap<DbId, LedgerEntry>,
    ad_configs: BTreeMap<DbId, AdConfig>,
    ad_events: Vec<AdAnalyticsEvent>,
}

impl Inner {
    fn allocate_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }

    fn insert_entry(
        &mut self,
        input: &NewLedgerEntry,
        session_id: DbId,
    ) -> Result<LedgerEntry, StoreError> {
        if self.ledger.values().any(|e| e.token_hash == input.token_hash) {
            return Err(StoreError::Conflict("refresh token hash already exists".into()));
        }
        let entry = LedgerEntry {
            id: self.allocate_id(),
            user_id: input.user_id,
            session_id: Some(session_id),
            parent_id: input.parent_id,
            token_hash: input.token_hash.clone(),
            status: LedgerStatus::Live,
            expires_at: input.expires_at,
            created_at: input.created_at,
            spent_at: None,
        };
        self.ledger.insert(entry.id, entry.clone());
        Ok(entry)
    }

    /// Revoke live ledger entries matching `pred`. Returns how many changed.
    fn revoke_entries(&mut self, pred: impl Fn(&LedgerEntry) -> bool) -> u64 {
        let mut count = 0;
        for entry in self.ledger.values_mut() {
            if entry.status == LedgerStatus::Live && pred(entry) {
                entry.status = LedgerStatus::Revoked;
                count += 1;
            }
        }
        count
    }
}

/// Mutex-guarded in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_next_ledger_insert: AtomicBool,
    fail_next_config_lookup: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next ledger insert inside [`CredentialStore::insert_pair`]
    /// fail after the session row has been staged.
    pub fn fail_next_ledger_insert(&self) {
        self.fail_next_ledger_insert.store(true, Ordering::SeqCst);
    }

    /// Make the next [`AdConfigStore::list_active`] call report a backend error.
    pub fn fail_next_config_lookup(&self) {
        self.fail_next_config_lookup.store(true, Ordering::SeqCst);
    }

    /// Overwrite a user's entitlement, as the payment collaborator would.
    pub fn set_subscription(
        &self,
        user_id: DbId,
        state: SubscriptionState,
        expiry: Option<Timestamp>,
    ) -> Result<(), StoreError> {
        self.transaction(|inner| {
            let user = inner
                .users
                .get_mut(&user_id)
                .ok_or_else(|| StoreError::Backend(format!("no user {user_id}")))?;
            user.subscription_state = state;
            user.subscription_expiry = expiry;
            user.updated_at = Utc::now();
            Ok(())
        })
    }

    /// Snapshot of every session row belonging to `user_id`.
    pub fn sessions_for(&self, user_id: DbId) -> Vec<SessionRecord> {
        self.read(|inner| {
            inner
                .sessions
                .values()
                .filter(|s| s.user_id == user_id)
                .cloned()
                .collect()
        })
    }

    /// Snapshot of every ledger entry belonging to `user_id`, oldest first.
    pub fn ledger_for(&self, user_id: DbId) -> Vec<LedgerEntry> {
        self.read(|inner| {
            inner
                .ledger
                .values()
                .filter(|e| e.user_id == user_id)
                .cloned()
                .collect()
        })
    }

    /// Snapshot of all recorded analytics events.
    pub fn ad_events(&self) -> Vec<AdAnalyticsEvent> {
        self.read(|inner| inner.ad_events.clone())
    }

    /// Move a ledger entry's expiry, e.g. to simulate a token aging out.
    pub fn set_ledger_expiry(&self, entry_id: DbId, expires_at: Timestamp) -> Result<(), StoreError> {
        self.transaction(|inner| {
            let entry = inner
                .ledger
                .get_mut(&entry_id)
                .ok_or_else(|| StoreError::Backend(format!("no ledger entry {entry_id}")))?;
            entry.expires_at = expires_at;
            Ok(())
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Writes only land via `transaction`, so poisoned state is never partial.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read<T>(&self, f: impl FnOnce(&Inner) -> T) -> T {
        f(&self.lock())
    }

    fn transaction<T>(
        &self,
        f: impl FnOnce(&mut Inner) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.lock();
        let mut staged = guard.clone();
        let out = f(&mut staged)?;
        *guard = staged;
        Ok(out)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user(&self, id: DbId) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.read(|inner| inner.users.get(&id).cloned()))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.read(|inner| inner.users.values().find(|u| u.email == email).cloned()))
    }

    async fn create_user(&self, input: &NewUser) -> Result<UserRecord, StoreError> {
        self.transaction(|inner| {
            if inner.users.values().any(|u| u.email == input.email) {
                return Err(StoreError::Conflict("email already registered".into()));
            }
            if let Some(external_id) = &input.external_id {
                if inner
                    .users
                    .values()
                    .any(|u| u.external_id.as_ref() == Some(external_id))
                {
                    return Err(StoreError::Conflict("external identity already linked".into()));
                }
            }
            let now = Utc::now();
            let user = UserRecord {
                id: inner.allocate_id(),
                email: input.email.clone(),
                external_id: input.external_id.clone(),
                password_hash: input.password_hash.clone(),
                email_verified: input.email_verified,
                role: input.role,
                subscription_state: SubscriptionState::Free,
                subscription_expiry: None,
                created_at: now,
                updated_at: now,
            };
            inner.users.insert(user.id, user.clone());
            Ok(user)
        })
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn find_session_by_access_hash(
        &self,
        access_token_hash: &str,
    ) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.read(|inner| {
            inner
                .sessions
                .values()
                .find(|s| s.access_token_hash == access_token_hash)
                .cloned()
        }))
    }
}

#[async_trait]
impl RefreshLedger for MemoryStore {
    async fn find_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<LedgerEntry>, StoreError> {
        Ok(self.read(|inner| {
            inner
                .ledger
                .values()
                .find(|e| e.token_hash == token_hash)
                .cloned()
        }))
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn insert_pair(
        &self,
        session: &NewSession,
        entry: &NewLedgerEntry,
    ) -> Result<(SessionRecord, LedgerEntry), StoreError> {
        self.transaction(|inner| {
            if let Some(device_id) = &session.device_id {
                let replaced: Vec<DbId> = inner
                    .sessions
                    .values_mut()
                    .filter(|s| {
                        s.user_id == session.user_id
                            && !s.is_revoked
                            && s.device_id.as_ref() == Some(device_id)
                    })
                    .map(|s| {
                        s.is_revoked = true;
                        s.id
                    })
                    .collect();
                inner.revoke_entries(|e| e.session_id.is_some_and(|id| replaced.contains(&id)));
            }

            let record = SessionRecord {
                id: inner.allocate_id(),
                user_id: session.user_id,
                device_id: session.device_id.clone(),
                access_token_hash: session.access_token_hash.clone(),
                expires_at: session.expires_at,
                is_revoked: false,
                created_at: session.created_at,
                updated_at: session.created_at,
            };
            inner.sessions.insert(record.id, record.clone());

            if self.fail_next_ledger_insert.swap(false, Ordering::SeqCst) {
                return Err(StoreError::Backend("injected ledger insert failure".into()));
            }
            let entry = inner.insert_entry(entry, record.id)?;
            Ok((record, entry))
        })
    }

    async fn rotate_pair(&self, request: &RotationRequest) -> Result<RotationWrite, StoreError> {
        self.transaction(|inner| {
            match inner.ledger.get(&request.presented_id).map(|e| e.status) {
                Some(LedgerStatus::Live) => {}
                Some(LedgerStatus::Spent) => return Ok(RotationWrite::AlreadySpent),
                Some(LedgerStatus::Revoked) | None => return Ok(RotationWrite::NotLive),
            }
            let session_live = inner
                .sessions
                .get(&request.session_id)
                .is_some_and(|s| !s.is_revoked);
            if !session_live {
                return Ok(RotationWrite::NotLive);
            }

            let now = Utc::now();
            if let Some(presented) = inner.ledger.get_mut(&request.presented_id) {
                presented.status = LedgerStatus::Spent;
                presented.spent_at = Some(now);
            }

            let session = match inner.sessions.get_mut(&request.session_id) {
                Some(s) => {
                    s.access_token_hash = request.access_token_hash.clone();
                    s.expires_at = request.session_expires_at;
                    s.updated_at = now;
                    s.clone()
                }
                None => return Err(StoreError::Backend("session vanished mid-rotation".into())),
            };

            let entry = inner.insert_entry(&request.successor, session.id)?;
            Ok(RotationWrite::Rotated { session, entry })
        })
    }

    async fn revoke_user(&self, user_id: DbId) -> Result<Revocation, StoreError> {
        self.transaction(|inner| {
            let mut sessions = 0;
            for session in inner.sessions.values_mut() {
                if session.user_id == user_id && !session.is_revoked {
                    session.is_revoked = true;
                    session.updated_at = Utc::now();
                    sessions += 1;
                }
            }
            let ledger_entries = inner.revoke_entries(|e| e.user_id == user_id);
            Ok(Revocation {
                sessions,
                ledger_entries,
            })
        })
    }

    async fn end_session(&self, session_id: DbId) -> Result<bool, StoreError> {
        self.transaction(|inner| {
            if inner.sessions.remove(&session_id).is_none() {
                return Ok(false);
            }
            inner.revoke_entries(|e| e.session_id == Some(session_id));
            for entry in inner.ledger.values_mut() {
                if entry.session_id == Some(session_id) {
                    entry.session_id = None;
                }
            }
            Ok(true)
        })
    }

    async fn purge_expired(&self, now: Timestamp) -> Result<u64, StoreError> {
        self.transaction(|inner| {
            let before = inner.sessions.len() + inner.ledger.len();
            inner
                .sessions
                .retain(|_, s| !s.is_revoked && s.expires_at > now);
            inner.ledger.retain(|_, e| e.expires_at > now);
            let live_sessions: Vec<DbId> = inner.sessions.keys().copied().collect();
            for entry in inner.ledger.values_mut() {
                if entry.session_id.is_some_and(|id| !live_sessions.contains(&id)) {
                    entry.session_id = None;
                }
            }
            Ok((before - inner.sessions.len() - inner.ledger.len()) as u64)
        })
    }
}

#[async_trait]
impl AdConfigStore for MemoryStore {
    async fn list_active(&self, ad_type: Option<AdType>) -> Result<Vec<AdConfig>, StoreError> {
        if self.fail_next_config_lookup.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Backend("injected config lookup failure".into()));
        }
        Ok(self.read(|inner| {
            let mut configs: Vec<AdConfig> = inner
                .ad_configs
                .values()
                .filter(|c| c.is_active && ad_type.is_none_or(|t| c.ad_type == t))
                .cloned()
                .collect();
            configs.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
            configs
        }))
    }

    async fn upsert(&self, input: &UpsertAdConfig) -> Result<AdConfig, StoreError> {
        self.transaction(|inner| {
            let now = Utc::now();
            let existing = inner
                .ad_configs
                .values_mut()
                .find(|c| c.ad_type == input.ad_type && c.ad_network_id == input.ad_network_id);

            if let Some(config) = existing {
                if let Some(is_active) = input.is_active {
                    config.is_active = is_active;
                }
                if let Some(frequency) = input.display_frequency {
                    config.display_frequency = frequency;
                }
                config.updated_at = now;
                return Ok(config.clone());
            }

            let config = AdConfig {
                id: inner.allocate_id(),
                ad_type: input.ad_type,
                ad_network_id: input.ad_network_id.clone(),
                is_active: input.is_active.unwrap_or(true),
                display_frequency: input.display_frequency.unwrap_or(DEFAULT_DISPLAY_FREQUENCY),
                created_at: now,
                updated_at: now,
            };
            inner.ad_configs.insert(config.id, config.clone());
            Ok(config)
        })
    }

    async fn disable(&self, id: DbId) -> Result<Option<AdConfig>, StoreError> {
        self.transaction(|inner| {
            Ok(inner.ad_configs.get_mut(&id).map(|config| {
                config.is_active = false;
                config.updated_at = Utc::now();
                config.clone()
            }))
        })
    }
}

#[async_trait]
impl AnalyticsSink for MemoryStore {
    async fn append(&self, event: &NewAdAnalyticsEvent) -> Result<AdAnalyticsEvent, StoreError> {
        self.transaction(|inner| {
            let stored = AdAnalyticsEvent {
                id: inner.allocate_id(),
                user_id: event.user_id,
                ad_type: event.ad_type,
                action: event.action,
                ad_network_id: event.ad_network_id.clone(),
                timestamp: event.timestamp,
            };
            inner.ad_events.push(stored.clone());
            Ok(stored)
        })
    }

    async fn aggregate(
        &self,
        start: Option<Timestamp>,
        end: Option<Timestamp>,
    ) -> Result<Vec<AnalyticsBucket>, StoreError> {
        Ok(self.read(|inner| {
            let mut counts: HashMap<_, i64> = HashMap::new();
            for event in &inner.ad_events {
                let after_start = start.is_none_or(|s| event.timestamp >= s);
                let before_end = end.is_none_or(|e| event.timestamp <= e);
                if after_start && before_end {
                    *counts.entry((event.ad_type, event.action)).or_default() += 1;
                }
            }
            let mut buckets: Vec<AnalyticsBucket> = counts
                .into_iter()
                .map(|((ad_type, action), count)| AnalyticsBucket {
                    ad_type,
                    action,
                    count,
                })
                .collect();
            buckets.sort_by(|a, b| {
                (a.ad_type.as_str(), a.action.as_str()).cmp(&(b.ad_type.as_str(), b.action.as_str()))
            });
            buckets
        }))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
