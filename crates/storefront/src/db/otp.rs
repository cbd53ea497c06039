//! Pending verification codes.
//!
//! One row per `(user, channel)`. Confirmation runs under a row lock so two
//! concurrent submissions of the same code cannot both succeed.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use mandir_core::UserId;
use mandir_core::verification::{OtpChannel, OtpCode, PendingCode, VerificationError};

use super::RepositoryError;

#[derive(sqlx::FromRow)]
struct PendingRow {
    code: String,
    expires_at: DateTime<Utc>,
    verified_at: Option<DateTime<Utc>>,
}

/// Result of confirming a code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// The code matched; the stage is now verified.
    Verified,
    /// The code was refused; nothing was written.
    Rejected(VerificationError),
    /// No code was ever sent for this stage.
    NoPendingCode,
}

/// Repository for `verification_codes`.
pub struct VerificationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> VerificationRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a freshly issued code, replacing any earlier one for the stage.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the write fails.
    pub async fn upsert(
        &self,
        user_id: UserId,
        channel: OtpChannel,
        destination: &str,
        pending: &PendingCode,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO verification_codes (user_id, channel, destination, code, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, channel) DO UPDATE
            SET destination = EXCLUDED.destination,
                code = EXCLUDED.code,
                expires_at = EXCLUDED.expires_at,
                verified_at = NULL,
                created_at = now()
            ",
        )
        .bind(user_id.as_i32())
        .bind(channel)
        .bind(destination)
        .bind(pending.code.as_str())
        .bind(pending.expires_at)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Check `input` against the stored code and mark the stage verified.
    ///
    /// On success the profile's `email_verified_at` or `phone_verified_at`
    /// is stamped in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any query fails.
    pub async fn confirm(
        &self,
        user_id: UserId,
        channel: OtpChannel,
        input: &str,
        now: DateTime<Utc>,
    ) -> Result<ConfirmOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row: Option<PendingRow> = sqlx::query_as(
            r"
            SELECT code, expires_at, verified_at
            FROM verification_codes
            WHERE user_id = $1 AND channel = $2
            FOR UPDATE
            ",
        )
        .bind(user_id.as_i32())
        .bind(channel)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(ConfirmOutcome::NoPendingCode);
        };

        let mut pending = PendingCode {
            code: OtpCode::from_stored(row.code),
            expires_at: row.expires_at,
            verified_at: row.verified_at,
        };
        if let Err(e) = pending.verify(input, now) {
            return Ok(ConfirmOutcome::Rejected(e));
        }

        sqlx::query(
            r"
            UPDATE verification_codes
            SET verified_at = $3
            WHERE user_id = $1 AND channel = $2
            ",
        )
        .bind(user_id.as_i32())
        .bind(channel)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let profile_update = match channel {
            OtpChannel::Email => {
                "UPDATE profiles SET email_verified_at = $2, updated_at = now() WHERE user_id = $1"
            }
            OtpChannel::Phone => {
                "UPDATE profiles SET phone_verified_at = $2, updated_at = now() WHERE user_id = $1"
            }
        };
        sqlx::query(profile_update)
            .bind(user_id.as_i32())
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(ConfirmOutcome::Verified)
    }

    /// Whether the stage has been verified.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn is_verified(
        &self,
        user_id: UserId,
        channel: OtpChannel,
    ) -> Result<bool, RepositoryError> {
        let verified: Option<bool> = sqlx::query_scalar(
            r"
            SELECT verified_at IS NOT NULL
            FROM verification_codes
            WHERE user_id = $1 AND channel = $2
            ",
        )
        .bind(user_id.as_i32())
        .bind(channel)
        .fetch_optional(self.pool)
        .await?;

        Ok(verified.unwrap_or(false))
    }
}
