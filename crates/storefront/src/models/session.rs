//! Session-related types.
//!
//! The session doubles as the device's local storage: everything stored
//! here lives only as long as this browser's session cookie.

use serde::{Deserialize, Serialize};

use mandir_core::{Email, UserId};

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the per-device identifier that scopes session events.
    pub const DEVICE_ID: &str = "device_id";

    /// Key for the persisted cart payload.
    pub const CART: &str = "cart";

    /// Prefix for the active-role preference, suffixed with the user id.
    pub const ACTIVE_ROLE_PREFIX: &str = "active_role:";

    /// Key for the active-role preference of a given user.
    #[must_use]
    pub fn active_role(user_id: mandir_core::UserId) -> String {
        format!("{ACTIVE_ROLE_PREFIX}{user_id}")
    }
}
