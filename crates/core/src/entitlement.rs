//! Subscription entitlement gate.
//!
//! Decides whether a user is on the ad-supported tier. The gate is advisory:
//! any failure to read the user falls back to "restricted" so that an outage
//! never silently grants premium behaviour.

use std::sync::Arc;

use chrono::Utc;

use crate::store::UserStore;
use crate::types::{define_text_enum, DbId, Timestamp};

define_text_enum! {
    /// Stored subscription state of a user. Written only by payment processing.
    SubscriptionState {
        Free = "FREE",
        SubscriptionActive = "SUBSCRIPTION_ACTIVE",
        Lifetime = "LIFETIME",
    }
}

/// Return `true` when monetization-gated features should be restricted.
///
/// An active subscription covers every instant strictly before its expiry;
/// at the expiry instant itself the user is restricted again.
pub fn decide(state: SubscriptionState, expiry: Option<Timestamp>, now: Timestamp) -> bool {
    match state {
        SubscriptionState::Lifetime => false,
        SubscriptionState::SubscriptionActive => match expiry {
            Some(expires_at) => expires_at <= now,
            None => true,
        },
        SubscriptionState::Free => true,
    }
}

/// Entitlement lookups against the user store.
#[derive(Clone)]
pub struct EntitlementGate {
    users: Arc<dyn UserStore>,
}

impl EntitlementGate {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Whether `user_id` is on the restricted (ad-eligible) tier right now.
    pub async fn is_restricted(&self, user_id: DbId) -> bool {
        self.is_restricted_at(user_id, Utc::now()).await
    }

    /// [`is_restricted`](Self::is_restricted) evaluated at a fixed instant.
    pub async fn is_restricted_at(&self, user_id: DbId, now: Timestamp) -> bool {
        match self.users.find_user(user_id).await {
            Ok(Some(user)) => decide(user.subscription_state, user.subscription_expiry, now),
            Ok(None) => {
                tracing::debug!(user_id, "Entitlement check for unknown user, restricting");
                true
            }
            Err(e) => {
                tracing::warn!(
                    user_id,
                    error = %e,
                    "EntitlementLookupFailure: falling back to restricted"
                );
                true
            }
        }
    }
}
