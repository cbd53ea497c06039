//! One-time verification codes for email and phone.
//!
//! A code belongs to a verification stage (a user plus a channel). Sending a
//! new code replaces the pending one for that stage. A code is good for
//! [`CODE_TTL`] and can be confirmed once.

use core::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// How long a code stays valid after it is issued.
pub const CODE_TTL: Duration = Duration::minutes(10);

/// Number of digits in a code.
pub const CODE_LENGTH: usize = 6;

/// Where a code is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "otp_channel", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OtpChannel {
    Email,
    Phone,
}

impl OtpChannel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
        }
    }
}

impl fmt::Display for OtpChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OtpChannel {
    type Err = VerificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "email" => Ok(Self::Email),
            "phone" => Ok(Self::Phone),
            other => Err(VerificationError::UnknownChannel(other.to_owned())),
        }
    }
}

/// A six-digit code.
///
/// `Debug` does not print the digits.
#[derive(Clone, PartialEq, Eq)]
pub struct OtpCode(String);

impl OtpCode {
    /// Generate a fresh random code in `100000..=999999`.
    #[must_use]
    pub fn generate() -> Self {
        let code: u32 = rand::rng().random_range(100_000..1_000_000);
        Self(code.to_string())
    }

    /// Wrap a stored code.
    #[must_use]
    pub const fn from_stored(code: String) -> Self {
        Self(code)
    }

    /// The digits, for storage and delivery.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn matches(&self, input: &str) -> bool {
        let input = input.trim();
        input.len() == CODE_LENGTH
            && input.bytes().all(|b| b.is_ascii_digit())
            && input == self.0
    }
}

impl fmt::Debug for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OtpCode(******)")
    }
}

/// Why a code was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("this code has already been used")]
    AlreadyVerified,
    #[error("this code has expired, request a new one")]
    Expired,
    #[error("the code does not match")]
    Mismatch,
    #[error("unknown verification channel: {0}")]
    UnknownChannel(String),
}

/// A code waiting to be confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCode {
    pub code: OtpCode,
    pub expires_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
}

impl PendingCode {
    /// Issue a new code valid for [`CODE_TTL`] from `now`.
    #[must_use]
    pub fn issue(now: DateTime<Utc>) -> Self {
        Self {
            code: OtpCode::generate(),
            expires_at: now + CODE_TTL,
            verified_at: None,
        }
    }

    /// Whether the code is past its expiry at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Confirm the code. On success `verified_at` is set to `now`.
    ///
    /// # Errors
    ///
    /// Fails without changing anything if the code was already used, has
    /// expired, or does not match.
    pub fn verify(&mut self, input: &str, now: DateTime<Utc>) -> Result<(), VerificationError> {
        if self.verified_at.is_some() {
            return Err(VerificationError::AlreadyVerified);
        }
        if self.is_expired(now) {
            return Err(VerificationError::Expired);
        }
        if !self.code.matches(input) {
            return Err(VerificationError::Mismatch);
        }
        self.verified_at = Some(now);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn pending(code: &str, now: DateTime<Utc>) -> PendingCode {
        PendingCode {
            code: OtpCode::from_stored(code.to_owned()),
            expires_at: now + CODE_TTL,
            verified_at: None,
        }
    }

    #[test]
    fn test_generated_code_is_six_digits() {
        for _ in 0..100 {
            let code = OtpCode::generate();
            assert_eq!(code.as_str().len(), CODE_LENGTH);
            let n: u32 = code.as_str().parse().unwrap();
            assert!((100_000..1_000_000).contains(&n));
        }
    }

    #[test]
    fn test_issue_expires_after_ttl() {
        let now = Utc::now();
        let code = PendingCode::issue(now);
        assert_eq!(code.expires_at - now, Duration::minutes(10));
        assert!(!code.is_expired(now + Duration::minutes(9)));
        assert!(code.is_expired(now + Duration::minutes(10)));
    }

    #[test]
    fn test_verify_marks_once() {
        let now = Utc::now();
        let mut code = pending("482913", now);
        assert_eq!(code.verify(" 482913 ", now), Ok(()));
        assert_eq!(code.verified_at, Some(now));
        assert_eq!(
            code.verify("482913", now),
            Err(VerificationError::AlreadyVerified)
        );
        assert_eq!(code.verified_at, Some(now));
    }

    #[test]
    fn test_wrong_code_does_not_mark() {
        let now = Utc::now();
        let mut code = pending("482913", now);
        assert_eq!(code.verify("000000", now), Err(VerificationError::Mismatch));
        assert_eq!(code.verify("48291", now), Err(VerificationError::Mismatch));
        assert!(code.verified_at.is_none());
    }

    #[test]
    fn test_expired_code_rejected_even_if_correct() {
        let now = Utc::now();
        let mut code = pending("482913", now);
        let later = now + Duration::minutes(11);
        assert_eq!(code.verify("482913", later), Err(VerificationError::Expired));
        assert!(code.verified_at.is_none());
    }

    #[test]
    fn test_debug_hides_digits() {
        let code = OtpCode::from_stored("123456".to_owned());
        assert!(!format!("{code:?}").contains("123456"));
    }

    #[test]
    fn test_channel_parse() {
        assert_eq!("phone".parse::<OtpChannel>(), Ok(OtpChannel::Phone));
        assert!("fax".parse::<OtpChannel>().is_err());
    }
}
