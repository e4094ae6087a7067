//! Refresh-token rotation with replay (theft) detection.
//!
//! Each refresh token can be exchanged exactly once. Exchanging marks the
//! ledger entry `SPENT` and inserts a successor in the same transaction.
//! Presenting a spent token again means two parties hold the same chain, so
//! every session of the user is revoked and both must sign in again.

use std::sync::Arc;

use chrono::Utc;

use super::credentials::hash_token;
use super::error::AuthError;
use super::issuer::{CredentialIssuer, IssuedCredentials};
use crate::store::{
    CredentialStore, LedgerEntry, LedgerStatus, NewLedgerEntry, RotationRequest, RotationWrite,
};

/// Exchanges refresh tokens for new credential pairs.
#[derive(Clone)]
pub struct RefreshRotation {
    store: Arc<dyn CredentialStore>,
    issuer: CredentialIssuer,
}

impl RefreshRotation {
    pub fn new(store: Arc<dyn CredentialStore>, issuer: CredentialIssuer) -> Self {
        Self { store, issuer }
    }

    /// Exchange `presented` for a new (access, refresh) pair.
    ///
    /// Checks run in order: unknown token, expiry, replay of a spent token,
    /// revoked token. Only a live, unexpired token reaches the write.
    pub async fn rotate(&self, presented: &str) -> Result<IssuedCredentials, AuthError> {
        let Some(entry) = self.store.find_by_token_hash(&hash_token(presented)).await? else {
            tracing::debug!("Refresh rejected: unknown token");
            return Err(AuthError::InvalidRefreshToken);
        };

        if entry.expires_at <= Utc::now() {
            tracing::debug!(entry_id = entry.id, user_id = entry.user_id, "Refresh rejected: expired");
            return Err(AuthError::RefreshTokenExpired);
        }

        match entry.status {
            LedgerStatus::Live => {}
            LedgerStatus::Spent => return Err(self.revoke_for_reuse(&entry).await),
            LedgerStatus::Revoked => {
                tracing::info!(
                    entry_id = entry.id,
                    user_id = entry.user_id,
                    "Refresh rejected: revoked token presented"
                );
                return Err(AuthError::InvalidRefreshToken);
            }
        }

        let Some(session_id) = entry.session_id else {
            tracing::info!(entry_id = entry.id, "Refresh rejected: live token without session");
            return Err(AuthError::InvalidRefreshToken);
        };

        let user = self
            .issuer
            .load_user(entry.user_id)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        let minted = self.issuer.mint(&user)?;
        let request = RotationRequest {
            presented_id: entry.id,
            session_id,
            successor: NewLedgerEntry {
                user_id: entry.user_id,
                parent_id: Some(entry.id),
                token_hash: minted.refresh_token_hash.clone(),
                expires_at: minted.refresh_expires_at,
                created_at: minted.issued_at,
            },
            access_token_hash: minted.access_token_hash.clone(),
            session_expires_at: minted.refresh_expires_at,
        };

        match self.store.rotate_pair(&request).await? {
            RotationWrite::Rotated { session, entry: successor } => {
                tracing::info!(
                    user_id = user.id,
                    session_id = session.id,
                    spent_entry_id = entry.id,
                    entry_id = successor.id,
                    "Refresh token rotated"
                );
                Ok(self.issuer.package(minted, session.id, user))
            }
            // Lost the race to a concurrent exchange of the same token.
            RotationWrite::AlreadySpent => Err(self.revoke_for_reuse(&entry).await),
            RotationWrite::NotLive => {
                tracing::info!(entry_id = entry.id, "Refresh rejected: revoked during rotation");
                Err(AuthError::InvalidRefreshToken)
            }
        }
    }

    /// Revoke every credential of the entry's owner after a spent token was
    /// replayed. Yields the error to report to the caller.
    async fn revoke_for_reuse(&self, entry: &LedgerEntry) -> AuthError {
        match self.store.revoke_user(entry.user_id).await {
            Ok(revoked) => {
                tracing::warn!(
                    user_id = entry.user_id,
                    entry_id = entry.id,
                    sessions = revoked.sessions,
                    ledger_entries = revoked.ledger_entries,
                    "Spent refresh token replayed, revoked all sessions for user"
                );
                AuthError::RefreshTokenReused
            }
            Err(e) => {
                tracing::error!(
                    user_id = entry.user_id,
                    entry_id = entry.id,
                    error = %e,
                    "Spent refresh token replayed but revocation failed"
                );
                AuthError::Persistence(e)
            }
        }
    }
}
