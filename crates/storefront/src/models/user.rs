//! User domain types.
//!
//! These types represent validated domain objects separate from database row types.

use chrono::{DateTime, Utc};

use mandir_core::{Email, UserId};

/// A marketplace account.
#[derive(Debug, Clone)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Profile details captured at sign-up and during verification.
#[derive(Debug, Clone)]
pub struct Profile {
    pub user_id: UserId,
    pub full_name: String,
    pub country: String,
    pub phone: Option<String>,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub phone_verified_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// Whether the email address has been confirmed with a code.
    #[must_use]
    pub const fn email_verified(&self) -> bool {
        self.email_verified_at.is_some()
    }

    /// Whether the phone number has been confirmed with a code.
    #[must_use]
    pub const fn phone_verified(&self) -> bool {
        self.phone_verified_at.is_some()
    }
}
