//! Role precedence and active-role resolution through the auth context.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use serde_json::json;

use mandir_core::guard::Viewer;
use mandir_core::{ActiveRole, Role, RoleSet, UserId};
use mandir_integration_tests::{FakeSession, FixedRoles, user};
use mandir_storefront::models::session_keys;
use mandir_storefront::services::auth_context::ROLE_PREFERENCE_VERSION;
use mandir_storefront::services::{AuthContext, MemoryStorage};

#[test]
fn primary_role_follows_precedence_not_grant_order() {
    let cases = [
        (vec![Role::Customer, Role::Admin], Role::Admin),
        (vec![Role::Vendor, Role::Customer], Role::Vendor),
        (vec![Role::Customer, Role::Vendor, Role::Admin], Role::Admin),
        (vec![Role::Customer], Role::Customer),
        (vec![], Role::Customer),
    ];
    for (grants, expected) in cases {
        assert_eq!(
            RoleSet::from_grants(grants.clone()).primary(),
            expected,
            "grants {grants:?}"
        );
    }
}

#[test]
fn active_role_never_leaves_granted_set() {
    let mut active = ActiveRole::resolve(
        RoleSet::from_grants([Role::Vendor, Role::Customer]),
        Some(Role::Admin),
    );
    assert_eq!(active.active(), Role::Vendor);

    for role in Role::ALL {
        active.switch_to(role);
        assert!(active.granted().contains(active.active()));
    }
    assert_eq!(active.active(), Role::Customer);
}

#[tokio::test]
async fn preference_survives_a_new_context_on_the_same_device() {
    let storage = MemoryStorage::new();
    let grants = || FixedRoles(Some(vec![Role::Admin, Role::Vendor, Role::Customer]));

    let first = AuthContext::init(FakeSession::new(Some(user(4))), grants(), storage.clone()).await;
    assert_eq!(first.resolved().await.active_role(), Some(Role::Admin));
    assert!(first.switch_role(Role::Vendor).await);
    drop(first);

    let second = AuthContext::init(FakeSession::new(Some(user(4))), grants(), storage).await;
    assert_eq!(second.resolved().await.active_role(), Some(Role::Vendor));
}

#[tokio::test]
async fn revoked_preference_falls_back_to_primary() {
    let storage = MemoryStorage::new();
    storage
        .put(
            &session_keys::active_role(UserId::new(5)),
            json!({"version": ROLE_PREFERENCE_VERSION, "role": "admin"}),
        )
        .await;

    let ctx = AuthContext::init(
        FakeSession::new(Some(user(5))),
        FixedRoles(Some(vec![Role::Customer, Role::Vendor])),
        storage,
    )
    .await;
    let snapshot = ctx.resolved().await;
    assert_eq!(snapshot.viewer(), Viewer::SignedIn(Role::Vendor));
}

#[tokio::test]
async fn preference_is_scoped_to_the_user() {
    let storage = MemoryStorage::new();
    storage
        .put(
            &session_keys::active_role(UserId::new(1)),
            json!({"version": ROLE_PREFERENCE_VERSION, "role": "customer"}),
        )
        .await;

    let ctx = AuthContext::init(
        FakeSession::new(Some(user(2))),
        FixedRoles(Some(vec![Role::Admin, Role::Customer])),
        storage,
    )
    .await;
    assert_eq!(ctx.resolved().await.active_role(), Some(Role::Admin));
}

#[tokio::test]
async fn unheld_switch_is_ignored_and_not_persisted() {
    let storage = MemoryStorage::new();
    let ctx = AuthContext::init(
        FakeSession::new(Some(user(6))),
        FixedRoles(Some(vec![Role::Customer])),
        storage.clone(),
    )
    .await;
    ctx.resolved().await;

    assert!(!ctx.switch_role(Role::Admin).await);
    assert_eq!(ctx.snapshot().active_role(), Some(Role::Customer));
    assert!(
        storage
            .get(&session_keys::active_role(UserId::new(6)))
            .await
            .is_none()
    );
}

#[tokio::test]
async fn sign_out_then_sign_in_as_someone_else() {
    let ctx = AuthContext::init(
        FakeSession::new(Some(user(1))),
        FixedRoles(Some(vec![Role::Vendor])),
        MemoryStorage::new(),
    )
    .await;
    assert_eq!(ctx.resolved().await.active_role(), Some(Role::Vendor));

    ctx.sign_out().await.unwrap();
    assert_eq!(ctx.snapshot().viewer(), Viewer::Anonymous);

    // The sign-out event may still be in flight; wait for the new user.
    ctx.sign_in(&user(2)).await.unwrap();
    let snapshot = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let snapshot = ctx.resolved().await;
            if snapshot.user.is_some() && snapshot.roles.is_some() {
                break snapshot;
            }
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
    assert_eq!(snapshot.user.clone().map(|u| u.id), Some(UserId::new(2)));
    assert_eq!(snapshot.active_role(), Some(Role::Vendor));
}
