//! Credential issuance: atomic session + ledger writes, device replacement.

mod common;

use adpass_core::auth::credentials::validate_token;
use adpass_core::auth::AuthError;
use adpass_core::entitlement::SubscriptionState;
use adpass_core::store::{LedgerStatus, StoreError};
use assert_matches::assert_matches;

#[tokio::test]
async fn issue_writes_session_and_ledger_entry_together() {
    let h = common::harness();
    let user = common::create_user(&h.store, "issue@example.com").await;

    let issued = h.issuer.issue(user.id, None).await.unwrap();

    let sessions = h.store.sessions_for(user.id);
    let ledger = h.store.ledger_for(user.id);
    assert_eq!(sessions.len(), 1);
    assert_eq!(ledger.len(), 1);
    assert_eq!(sessions[0].id, issued.session_id);
    assert_eq!(ledger[0].session_id, Some(issued.session_id));
    assert_eq!(ledger[0].parent_id, None);
    assert_eq!(ledger[0].status, LedgerStatus::Live);
    assert_eq!(sessions[0].created_at, ledger[0].created_at);
    assert_ne!(ledger[0].token_hash, issued.refresh_token, "plaintext is never stored");

    assert_eq!(issued.expires_in, 15 * 60);
    let claims = validate_token(&issued.access_token, &common::jwt_config()).unwrap();
    assert_eq!(claims.sub, user.id);
    assert_eq!(claims.entitlement, SubscriptionState::Free);
}

#[tokio::test]
async fn failed_ledger_insert_leaves_no_session_behind() {
    let h = common::harness();
    let user = common::create_user(&h.store, "atomic@example.com").await;

    h.store.fail_next_ledger_insert();
    let result = h.issuer.issue(user.id, None).await;

    assert_matches!(result, Err(AuthError::Persistence(StoreError::Backend(_))));
    assert!(h.store.sessions_for(user.id).is_empty());
    assert!(h.store.ledger_for(user.id).is_empty());

    // The store is usable again afterwards.
    h.issuer.issue(user.id, None).await.unwrap();
    assert_eq!(h.store.sessions_for(user.id).len(), 1);
}

#[tokio::test]
async fn unknown_user_cannot_be_issued_credentials() {
    let h = common::harness();
    assert_matches!(
        h.issuer.issue(404, None).await,
        Err(AuthError::InvalidCredentials)
    );
}

#[tokio::test]
async fn new_login_on_same_device_replaces_previous_session() {
    let h = common::harness();
    let user = common::create_user(&h.store, "device@example.com").await;

    let first = h.issuer.issue(user.id, Some("tablet")).await.unwrap();
    let second = h.issuer.issue(user.id, Some("tablet")).await.unwrap();
    let other = h.issuer.issue(user.id, Some("desktop")).await.unwrap();

    assert_matches!(
        h.rotation.rotate(&first.refresh_token).await,
        Err(AuthError::InvalidRefreshToken)
    );
    assert_matches!(
        h.issuer.authenticate(&first.access_token).await,
        Err(AuthError::SessionNotFound)
    );
    h.issuer.authenticate(&second.access_token).await.unwrap();
    h.issuer.authenticate(&other.access_token).await.unwrap();
}

#[tokio::test]
async fn garbage_access_token_is_rejected() {
    let h = common::harness();
    assert_matches!(
        h.issuer.authenticate("not.a.jwt").await,
        Err(AuthError::InvalidAccessToken)
    );
}
