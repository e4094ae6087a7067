use std::sync::Arc;

use adpass_core::ads::AdSelector;
use adpass_core::auth::{CredentialIssuer, RefreshRotation};
use adpass_core::entitlement::EntitlementGate;
use adpass_core::store::Store;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Backing store, used directly for user lookups and health checks.
    pub store: Arc<dyn Store>,
    pub config: Arc<ServerConfig>,
    pub issuer: CredentialIssuer,
    pub rotation: RefreshRotation,
    pub gate: EntitlementGate,
    pub ads: AdSelector,
}

impl AppState {
    /// Wire every service against one store.
    pub fn new<S: Store + 'static>(store: Arc<S>, config: ServerConfig) -> Self {
        let issuer = CredentialIssuer::new(store.clone(), store.clone(), config.jwt.clone());
        let rotation = RefreshRotation::new(store.clone(), issuer.clone());
        let gate = EntitlementGate::new(store.clone());
        let ads = AdSelector::new(store.clone(), store.clone(), gate.clone());

        Self {
            store,
            config: Arc::new(config),
            issuer,
            rotation,
            gate,
            ads,
        }
    }
}
