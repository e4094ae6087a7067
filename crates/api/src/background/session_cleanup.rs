//! Periodic purge of dead sessions and refresh tokens.
//!
//! Deletes revoked or expired sessions and refresh-ledger entries whose
//! expiry has passed. Expired entries can no longer be exchanged, so dropping
//! them loses no replay detection.

use std::sync::Arc;
use std::time::Duration;

use adpass_core::store::CredentialStore;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

/// Run the cleanup loop every `interval` until `cancel` is triggered.
///
/// The first sweep runs immediately.
pub async fn run(store: Arc<dyn CredentialStore>, interval: Duration, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = interval.as_secs(),
        "Session cleanup job started"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Session cleanup job stopping");
                break;
            }
            _ = ticker.tick() => {
                match store.purge_expired(Utc::now()).await {
                    Ok(deleted) if deleted > 0 => {
                        tracing::info!(deleted, "Session cleanup: purged rows");
                    }
                    Ok(_) => tracing::debug!("Session cleanup: nothing to purge"),
                    Err(e) => tracing::error!(error = %e, "Session cleanup failed"),
                }
            }
        }
    }
}
