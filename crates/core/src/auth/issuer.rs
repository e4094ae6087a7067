//! Credential issuance and session-bound access-token checks.

use std::sync::Arc;

use chrono::Utc;

use super::credentials::{
    generate_access_token, generate_refresh_token, hash_token, validate_token, Claims, JwtConfig,
};
use super::error::AuthError;
use crate::store::{
    CredentialStore, NewLedgerEntry, NewSession, SessionRecord, UserRecord, UserStore,
};
use crate::types::{DbId, Timestamp};

/// A freshly minted credential pair, already persisted.
#[derive(Debug, Clone)]
pub struct IssuedCredentials {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub session_id: DbId,
    pub user: UserRecord,
}

/// An access token that verified and is still bound to a live session.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub claims: Claims,
    pub session: SessionRecord,
}

/// A minted but not yet persisted pair.
pub(crate) struct MintedPair {
    pub access_token: String,
    pub access_token_hash: String,
    pub refresh_token: String,
    pub refresh_token_hash: String,
    pub issued_at: Timestamp,
    pub refresh_expires_at: Timestamp,
}

/// Mints (access, refresh) pairs and records them as a session.
#[derive(Clone)]
pub struct CredentialIssuer {
    store: Arc<dyn CredentialStore>,
    users: Arc<dyn UserStore>,
    config: JwtConfig,
}

impl CredentialIssuer {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        users: Arc<dyn UserStore>,
        config: JwtConfig,
    ) -> Self {
        Self {
            store,
            users,
            config,
        }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// Issue a new credential pair for an already verified user.
    ///
    /// The session row and the first ledger entry are written in one
    /// transaction; on failure nothing is left behind.
    pub async fn issue(
        &self,
        user_id: DbId,
        device_id: Option<&str>,
    ) -> Result<IssuedCredentials, AuthError> {
        let user = self
            .users
            .find_user(user_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let minted = self.mint(&user)?;

        let session = NewSession {
            user_id,
            device_id: device_id.map(str::to_string),
            access_token_hash: minted.access_token_hash.clone(),
            expires_at: minted.refresh_expires_at,
            created_at: minted.issued_at,
        };
        let entry = NewLedgerEntry {
            user_id,
            parent_id: None,
            token_hash: minted.refresh_token_hash.clone(),
            expires_at: minted.refresh_expires_at,
            created_at: minted.issued_at,
        };

        let (session, _entry) = self.store.insert_pair(&session, &entry).await?;
        tracing::info!(user_id, session_id = session.id, "Session issued");

        Ok(self.package(minted, session.id, user))
    }

    /// Verify an access token and require its session to still be live and
    /// bound to exactly this token.
    pub async fn authenticate(&self, access_token: &str) -> Result<Authenticated, AuthError> {
        let claims =
            validate_token(access_token, &self.config).map_err(|_| AuthError::InvalidAccessToken)?;

        let session = self
            .store
            .find_session_by_access_hash(&hash_token(access_token))
            .await?
            .filter(|s| s.user_id == claims.sub && s.is_usable_at(Utc::now()))
            .ok_or(AuthError::SessionNotFound)?;

        Ok(Authenticated { claims, session })
    }

    /// End a session: delete it and revoke its live refresh credential.
    pub async fn logout(&self, session_id: DbId) -> Result<(), AuthError> {
        if !self.store.end_session(session_id).await? {
            return Err(AuthError::SessionNotFound);
        }
        tracing::info!(session_id, "Session ended");
        Ok(())
    }

    pub(crate) async fn load_user(&self, user_id: DbId) -> Result<Option<UserRecord>, AuthError> {
        Ok(self.users.find_user(user_id).await?)
    }

    pub(crate) fn mint(&self, user: &UserRecord) -> Result<MintedPair, AuthError> {
        let issued_at = Utc::now();
        let access_token = generate_access_token(user, issued_at, &self.config)
            .map_err(|e| AuthError::TokenMinting(e.to_string()))?;
        let (refresh_token, refresh_token_hash) = generate_refresh_token();

        Ok(MintedPair {
            access_token_hash: hash_token(&access_token),
            access_token,
            refresh_token,
            refresh_token_hash,
            issued_at,
            refresh_expires_at: issued_at + self.config.refresh_token_ttl(),
        })
    }

    pub(crate) fn package(
        &self,
        minted: MintedPair,
        session_id: DbId,
        user: UserRecord,
    ) -> IssuedCredentials {
        IssuedCredentials {
            access_token: minted.access_token,
            refresh_token: minted.refresh_token,
            expires_in: self.config.access_token_ttl_secs(),
            session_id,
            user,
        }
    }
}
