//! One-time code round trips.

#![allow(clippy::unwrap_used)]

use chrono::{Duration, Utc};

use mandir_core::UserId;
use mandir_core::verification::{CODE_TTL, OtpChannel, PendingCode, VerificationError};
use mandir_integration_tests::{test_pool, unique_email};
use mandir_storefront::db::VerificationRepository;
use mandir_storefront::db::otp::ConfirmOutcome;
use mandir_storefront::services::AuthService;
use mandir_storefront::services::auth::SignUp;

#[test]
fn issued_code_confirms_once_within_ttl() {
    let now = Utc::now();
    let mut pending = PendingCode::issue(now);
    let code = pending.code.as_str().to_owned();

    assert_eq!(
        pending.verify("000000x", now),
        Err(VerificationError::Mismatch)
    );
    pending.verify(&code, now + Duration::minutes(1)).unwrap();
    assert!(pending.verified_at.is_some());
    assert_eq!(
        pending.verify(&code, now + Duration::minutes(2)),
        Err(VerificationError::AlreadyVerified)
    );
}

#[test]
fn code_expires_at_ttl() {
    let now = Utc::now();
    let mut pending = PendingCode::issue(now);
    let code = pending.code.as_str().to_owned();
    assert_eq!(
        pending.verify(&code, now + CODE_TTL),
        Err(VerificationError::Expired)
    );
    assert!(pending.verified_at.is_none());
}

#[tokio::test]
#[ignore = "Requires MANDIR_TEST_DATABASE_URL"]
async fn stored_code_round_trip() {
    let pool = test_pool().await;
    let email = unique_email("otp");
    let user = AuthService::new(&pool)
        .sign_up(SignUp {
            email: &email,
            password: "correct-horse-battery",
            full_name: "Seva Test",
            country: "IN",
        })
        .await
        .unwrap();
    let repo = VerificationRepository::new(&pool);
    let now = Utc::now();

    let pending = PendingCode::issue(now);
    repo.upsert(user.id, OtpChannel::Email, &email, &pending)
        .await
        .unwrap();
    assert!(!repo.is_verified(user.id, OtpChannel::Email).await.unwrap());

    let wrong = repo
        .confirm(user.id, OtpChannel::Email, "not-it", now)
        .await
        .unwrap();
    assert_eq!(wrong, ConfirmOutcome::Rejected(VerificationError::Mismatch));

    let right = repo
        .confirm(user.id, OtpChannel::Email, pending.code.as_str(), now)
        .await
        .unwrap();
    assert_eq!(right, ConfirmOutcome::Verified);
    assert!(repo.is_verified(user.id, OtpChannel::Email).await.unwrap());
}

#[tokio::test]
#[ignore = "Requires MANDIR_TEST_DATABASE_URL"]
async fn confirm_without_code_reports_nothing_pending() {
    let pool = test_pool().await;
    let outcome = VerificationRepository::new(&pool)
        .confirm(UserId::new(i32::MAX), OtpChannel::Phone, "123456", Utc::now())
        .await
        .unwrap();
    assert_eq!(outcome, ConfirmOutcome::NoPendingCode);
}
