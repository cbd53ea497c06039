//! One-time verification codes over email and SMS.
//!
//! Codes are never logged. Delivery failures are reported to the caller
//! after the code has been stored, so a resend simply replaces it.

use chrono::Utc;
use sqlx::PgPool;
use thiserror::Error;

use mandir_core::verification::{OtpChannel, PendingCode, VerificationError};
use mandir_core::{Email, EmailError as AddressError, PhoneError, PhoneNumber, UserId};

use super::email::{EmailError, EmailService};
use super::sms::{SmsClient, SmsError};
use crate::db::otp::ConfirmOutcome;
use crate::db::{RepositoryError, UserRepository, VerificationRepository};
use crate::models::SiteSettings;

/// Errors from sending or confirming a code.
#[derive(Debug, Error)]
pub enum OtpError {
    #[error("invalid email address: {0}")]
    InvalidEmail(#[from] AddressError),

    #[error("invalid phone number: {0}")]
    InvalidPhone(#[from] PhoneError),

    /// The channel has no delivery provider configured.
    #[error("{0} verification is not available")]
    ChannelUnavailable(OtpChannel),

    #[error("no code has been sent")]
    NoPendingCode,

    #[error(transparent)]
    Rejected(VerificationError),

    #[error("email delivery failed: {0}")]
    Email(#[from] EmailError),

    #[error("sms delivery failed: {0}")]
    Sms(#[from] SmsError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Where a code should go, already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Email(Email),
    Phone(PhoneNumber),
}

impl Destination {
    /// Validate `raw` for `channel`.
    ///
    /// # Errors
    ///
    /// Returns `OtpError::InvalidEmail` or `OtpError::InvalidPhone`.
    pub fn parse(channel: OtpChannel, raw: &str) -> Result<Self, OtpError> {
        Ok(match channel {
            OtpChannel::Email => Self::Email(Email::parse(raw)?),
            OtpChannel::Phone => Self::Phone(PhoneNumber::parse(raw)?),
        })
    }

    #[must_use]
    pub const fn channel(&self) -> OtpChannel {
        match self {
            Self::Email(_) => OtpChannel::Email,
            Self::Phone(_) => OtpChannel::Phone,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Email(email) => email.as_str(),
            Self::Phone(phone) => phone.as_str(),
        }
    }
}

/// Verification code service.
pub struct OtpService<'a> {
    pool: &'a PgPool,
    email: Option<&'a EmailService>,
    sms: Option<&'a SmsClient>,
}

impl<'a> OtpService<'a> {
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        email: Option<&'a EmailService>,
        sms: Option<&'a SmsClient>,
    ) -> Self {
        Self { pool, email, sms }
    }

    /// Whether a channel can currently deliver codes.
    #[must_use]
    pub const fn is_available(&self, channel: OtpChannel) -> bool {
        match channel {
            OtpChannel::Email => self.email.is_some(),
            OtpChannel::Phone => self.sms.is_some(),
        }
    }

    /// Issue a new code for `(user, channel)` and deliver it.
    ///
    /// Any earlier code for the same stage is replaced.
    ///
    /// # Errors
    ///
    /// Returns `OtpError::ChannelUnavailable` when no provider is configured,
    /// or the storage/delivery error.
    pub async fn send(
        &self,
        user_id: UserId,
        destination: &Destination,
        settings: &SiteSettings,
    ) -> Result<(), OtpError> {
        let channel = destination.channel();
        if !self.is_available(channel) {
            return Err(OtpError::ChannelUnavailable(channel));
        }

        let pending = PendingCode::issue(Utc::now());
        VerificationRepository::new(self.pool)
            .upsert(user_id, channel, destination.as_str(), &pending)
            .await?;

        match destination {
            Destination::Email(email) => {
                if let Some(mailer) = self.email {
                    mailer
                        .send_verification_code(email, &pending.code, settings)
                        .await?;
                }
            }
            Destination::Phone(phone) => {
                UserRepository::new(self.pool)
                    .set_phone(user_id, phone.as_str())
                    .await?;
                if let Some(sms) = self.sms {
                    sms.send_verification_code(phone, &pending.code, &settings.site_name)
                        .await?;
                }
            }
        }

        tracing::info!(%user_id, %channel, "verification code sent");
        Ok(())
    }

    /// Check a submitted code.
    ///
    /// # Errors
    ///
    /// Returns `OtpError::NoPendingCode` if nothing was sent,
    /// `OtpError::Rejected` for an expired, wrong or already-used code.
    pub async fn verify(
        &self,
        user_id: UserId,
        channel: OtpChannel,
        input: &str,
    ) -> Result<(), OtpError> {
        let outcome = VerificationRepository::new(self.pool)
            .confirm(user_id, channel, input.trim(), Utc::now())
            .await?;

        match outcome {
            ConfirmOutcome::Verified => {
                tracing::info!(%user_id, %channel, "contact verified");
                Ok(())
            }
            ConfirmOutcome::Rejected(reason) => {
                tracing::debug!(%user_id, %channel, %reason, "verification code rejected");
                Err(OtpError::Rejected(reason))
            }
            ConfirmOutcome::NoPendingCode => Err(OtpError::NoPendingCode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_matches_channel() {
        let email = Destination::parse(OtpChannel::Email, "bhakt@example.org");
        assert!(matches!(email, Ok(Destination::Email(_))));

        let phone = Destination::parse(OtpChannel::Phone, "+91 98765 43210");
        assert!(matches!(&phone, Ok(d) if d.channel() == OtpChannel::Phone));

        assert!(matches!(
            Destination::parse(OtpChannel::Email, "+919876543210"),
            Err(OtpError::InvalidEmail(_))
        ));
        assert!(matches!(
            Destination::parse(OtpChannel::Phone, "not a number"),
            Err(OtpError::InvalidPhone(_))
        ));
    }
}
