//! Refresh rotation: exactly-once exchange, replay detection, expiry, races.

mod common;

use adpass_core::auth::AuthError;
use adpass_core::store::LedgerStatus;
use assert_matches::assert_matches;
use chrono::{Duration, Utc};

#[tokio::test]
async fn rotation_issues_new_pair_and_extends_chain() {
    let h = common::harness();
    let user = common::create_user(&h.store, "chain@example.com").await;
    let issued = h.issuer.issue(user.id, None).await.unwrap();

    let rotated = h.rotation.rotate(&issued.refresh_token).await.unwrap();

    assert_ne!(rotated.refresh_token, issued.refresh_token);
    assert_ne!(rotated.access_token, issued.access_token);
    assert_eq!(rotated.session_id, issued.session_id, "rotation keeps the session");

    let ledger = h.store.ledger_for(user.id);
    assert_eq!(ledger.len(), 2);
    assert_eq!(ledger[0].status, LedgerStatus::Spent);
    assert!(ledger[0].spent_at.is_some());
    assert_eq!(ledger[1].status, LedgerStatus::Live);
    assert_eq!(ledger[1].parent_id, Some(ledger[0].id));
}

#[tokio::test]
async fn second_exchange_of_same_token_is_reuse_and_revokes_everything() {
    let h = common::harness();
    let user = common::create_user(&h.store, "replay@example.com").await;
    let laptop = h.issuer.issue(user.id, Some("laptop")).await.unwrap();
    let phone = h.issuer.issue(user.id, Some("phone")).await.unwrap();

    let rotated = h.rotation.rotate(&laptop.refresh_token).await.unwrap();
    let replay = h.rotation.rotate(&laptop.refresh_token).await;
    assert_matches!(replay, Err(AuthError::RefreshTokenReused));

    let sessions = h.store.sessions_for(user.id);
    assert_eq!(sessions.len(), 2);
    assert!(sessions.iter().all(|s| s.is_revoked), "every session must be revoked");
    assert!(h
        .store
        .ledger_for(user.id)
        .iter()
        .all(|e| e.status != LedgerStatus::Live));

    // Neither the legitimate successor nor the other device survives.
    assert_matches!(
        h.rotation.rotate(&rotated.refresh_token).await,
        Err(AuthError::InvalidRefreshToken)
    );
    assert_matches!(
        h.rotation.rotate(&phone.refresh_token).await,
        Err(AuthError::InvalidRefreshToken)
    );
    assert_matches!(
        h.issuer.authenticate(&rotated.access_token).await,
        Err(AuthError::SessionNotFound)
    );
}

#[tokio::test]
async fn unknown_token_is_invalid() {
    let h = common::harness();
    assert_matches!(
        h.rotation.rotate("definitely-not-issued").await,
        Err(AuthError::InvalidRefreshToken)
    );
}

#[tokio::test]
async fn expired_token_is_rejected_without_revocation() {
    let h = common::harness();
    let user = common::create_user(&h.store, "expired@example.com").await;
    let issued = h.issuer.issue(user.id, None).await.unwrap();
    let entry = h.store.ledger_for(user.id).remove(0);

    h.store
        .set_ledger_expiry(entry.id, Utc::now() - Duration::seconds(1))
        .unwrap();

    assert_matches!(
        h.rotation.rotate(&issued.refresh_token).await,
        Err(AuthError::RefreshTokenExpired)
    );
    assert!(h.store.sessions_for(user.id).iter().all(|s| !s.is_revoked));
}

#[tokio::test]
async fn rotation_rebinds_the_session_access_hash() {
    let h = common::harness();
    let user = common::create_user(&h.store, "rebind@example.com").await;
    let issued = h.issuer.issue(user.id, None).await.unwrap();

    h.issuer.authenticate(&issued.access_token).await.unwrap();
    let rotated = h.rotation.rotate(&issued.refresh_token).await.unwrap();

    assert_matches!(
        h.issuer.authenticate(&issued.access_token).await,
        Err(AuthError::SessionNotFound)
    );
    let authed = h.issuer.authenticate(&rotated.access_token).await.unwrap();
    assert_eq!(authed.session.id, issued.session_id);
    assert_eq!(authed.claims.sub, user.id);
}

#[tokio::test]
async fn refresh_after_logout_is_invalid() {
    let h = common::harness();
    let user = common::create_user(&h.store, "logout@example.com").await;
    let issued = h.issuer.issue(user.id, None).await.unwrap();

    h.issuer.logout(issued.session_id).await.unwrap();

    assert!(h.store.sessions_for(user.id).is_empty());
    assert_matches!(
        h.rotation.rotate(&issued.refresh_token).await,
        Err(AuthError::InvalidRefreshToken)
    );
    assert_matches!(
        h.issuer.logout(issued.session_id).await,
        Err(AuthError::SessionNotFound)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_rotation_has_exactly_one_winner() {
    for round in 0..20 {
        let h = common::harness();
        let user = common::create_user(&h.store, &format!("race{round}@example.com")).await;
        let issued = h.issuer.issue(user.id, None).await.unwrap();

        let (a, b) = (h.rotation.clone(), h.rotation.clone());
        let (ta, tb) = (issued.refresh_token.clone(), issued.refresh_token.clone());
        let first = tokio::spawn(async move { a.rotate(&ta).await });
        let second = tokio::spawn(async move { b.rotate(&tb).await });
        let results = [first.await.unwrap(), second.await.unwrap()];

        let wins = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1, "round {round}: exactly one rotation may succeed");
        for result in &results {
            if let Err(e) = result {
                assert_matches!(
                    e,
                    AuthError::RefreshTokenReused | AuthError::InvalidRefreshToken
                );
            }
        }
    }
}
