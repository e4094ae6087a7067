#![allow(dead_code)]

use std::sync::Arc;

use adpass_core::ads::AdSelector;
use adpass_core::auth::{CredentialIssuer, JwtConfig, RefreshRotation};
use adpass_core::entitlement::EntitlementGate;
use adpass_core::memory::MemoryStore;
use adpass_core::roles::UserRole;
use adpass_core::store::{NewUser, UserRecord, UserStore};

/// JWT settings with a fixed secret and the production default lifetimes.
pub fn jwt_config() -> JwtConfig {
    JwtConfig {
        secret: "core-test-secret-long-enough-for-hmac".to_string(),
        access_token_expiry_mins: 15,
        refresh_token_expiry_days: 30,
    }
}

/// Every component wired against one shared in-memory store.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub issuer: CredentialIssuer,
    pub rotation: RefreshRotation,
    pub gate: EntitlementGate,
    pub ads: AdSelector,
}

pub fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let issuer = CredentialIssuer::new(store.clone(), store.clone(), jwt_config());
    let rotation = RefreshRotation::new(store.clone(), issuer.clone());
    let gate = EntitlementGate::new(store.clone());
    let ads = AdSelector::new(store.clone(), store.clone(), gate.clone());
    Harness {
        store,
        issuer,
        rotation,
        gate,
        ads,
    }
}

/// Register a free-tier user directly in the store.
pub async fn create_user(store: &MemoryStore, email: &str) -> UserRecord {
    store
        .create_user(&NewUser {
            email: email.to_string(),
            external_id: None,
            password_hash: None,
            email_verified: true,
            role: UserRole::User,
        })
        .await
        .expect("user creation should succeed")
}
