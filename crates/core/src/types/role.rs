//! Marketplace roles and the active view role.
//!
//! A user may hold several role grants at once. Exactly one of them is the
//! *active view role*: the hat the user is wearing right now. UI gating and
//! route guards follow the active role, never the full set of grants.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A role grant.
///
/// Declaration order is precedence order: `Admin` outranks `Vendor`, which
/// outranks `Customer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "app_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Marketplace operator.
    Admin,
    /// Seller of products (including temple shops).
    Vendor,
    /// Shopper and devotee making bookings.
    Customer,
}

impl Role {
    /// All roles, highest precedence first.
    pub const ALL: [Self; 3] = [Self::Admin, Self::Vendor, Self::Customer];

    /// Canonical landing page for this role.
    #[must_use]
    pub const fn home_path(self) -> &'static str {
        match self {
            Self::Admin => "/admin",
            Self::Vendor => "/vendor",
            Self::Customer => "/dashboard",
        }
    }

    /// Lowercase name, as stored and as sent in forms.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Vendor => "vendor",
            Self::Customer => "customer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a role.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid role: {0}")]
pub struct RoleParseError(pub String);

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "admin" => Ok(Self::Admin),
            "vendor" => Ok(Self::Vendor),
            "customer" => Ok(Self::Customer),
            other => Err(RoleParseError(other.to_owned())),
        }
    }
}

/// The set of roles granted to a user, deduplicated and ordered by precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSet(Vec<Role>);

impl RoleSet {
    /// Build a set from grants in any order, dropping duplicates.
    #[must_use]
    pub fn from_grants(grants: impl IntoIterator<Item = Role>) -> Self {
        let mut roles: Vec<Role> = grants.into_iter().collect();
        roles.sort_unstable();
        roles.dedup();
        Self(roles)
    }

    /// The degraded default used when grants cannot be determined.
    #[must_use]
    pub fn customer_only() -> Self {
        Self(vec![Role::Customer])
    }

    /// Whether the role is granted.
    #[must_use]
    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    /// Whether no role is granted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Granted roles, highest precedence first.
    #[must_use]
    pub fn as_slice(&self) -> &[Role] {
        &self.0
    }

    /// The primary role: `admin` if held, else `vendor`, else `customer`.
    ///
    /// Grant order and recency play no part. An empty set yields `customer`.
    #[must_use]
    pub fn primary(&self) -> Role {
        self.0.first().copied().unwrap_or(Role::Customer)
    }

    /// Pick the active role given an optional stored preference.
    ///
    /// The preference wins only while it is still granted; otherwise the
    /// primary role is used.
    #[must_use]
    pub fn resolve_active(&self, preferred: Option<Role>) -> Role {
        match preferred {
            Some(role) if self.contains(role) => role,
            _ => self.primary(),
        }
    }
}

/// Granted roles together with the active view role.
///
/// Invariant: `active` is always a member of `granted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveRole {
    granted: RoleSet,
    active: Role,
}

impl ActiveRole {
    /// Resolve the active role for a set of grants and a stored preference.
    ///
    /// An empty grant set is widened to `customer` so the invariant holds.
    #[must_use]
    pub fn resolve(granted: RoleSet, preferred: Option<Role>) -> Self {
        let granted = if granted.is_empty() {
            RoleSet::customer_only()
        } else {
            granted
        };
        let active = granted.resolve_active(preferred);
        Self { granted, active }
    }

    /// The role currently worn.
    #[must_use]
    pub const fn active(&self) -> Role {
        self.active
    }

    /// All granted roles.
    #[must_use]
    pub const fn granted(&self) -> &RoleSet {
        &self.granted
    }

    /// Switch the active role.
    ///
    /// Returns `false` and leaves the active role untouched when `role` is not
    /// granted.
    pub fn switch_to(&mut self, role: Role) -> bool {
        if !self.granted.contains(role) {
            return false;
        }
        self.active = role;
        true
    }

    /// Whether the active role is `admin`.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.active == Role::Admin
    }

    /// Whether the active role is `vendor`.
    #[must_use]
    pub fn is_vendor(&self) -> bool {
        self.active == Role::Vendor
    }

    /// Whether the active role is `customer`.
    #[must_use]
    pub fn is_customer(&self) -> bool {
        self.active == Role::Customer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_follows_precedence_not_grant_order() {
        let set = RoleSet::from_grants([Role::Customer, Role::Vendor]);
        assert_eq!(set.primary(), Role::Vendor);

        let set = RoleSet::from_grants([Role::Customer, Role::Admin, Role::Vendor]);
        assert_eq!(set.primary(), Role::Admin);

        let set = RoleSet::from_grants([Role::Customer]);
        assert_eq!(set.primary(), Role::Customer);
    }

    #[test]
    fn test_empty_grants_default_to_customer() {
        assert_eq!(RoleSet::default().primary(), Role::Customer);
        let active = ActiveRole::resolve(RoleSet::default(), Some(Role::Admin));
        assert_eq!(active.active(), Role::Customer);
        assert!(active.granted().contains(Role::Customer));
    }

    #[test]
    fn test_from_grants_dedups() {
        let set = RoleSet::from_grants([Role::Vendor, Role::Vendor, Role::Customer]);
        assert_eq!(set.as_slice(), &[Role::Vendor, Role::Customer]);
    }

    #[test]
    fn test_stale_preference_falls_back_to_primary() {
        let set = RoleSet::from_grants([Role::Vendor, Role::Customer]);
        assert_eq!(set.resolve_active(Some(Role::Admin)), Role::Vendor);
        assert_eq!(set.resolve_active(Some(Role::Customer)), Role::Customer);
        assert_eq!(set.resolve_active(None), Role::Vendor);
    }

    #[test]
    fn test_switch_to_unheld_role_is_noop() {
        let mut active =
            ActiveRole::resolve(RoleSet::from_grants([Role::Vendor, Role::Customer]), None);
        assert!(!active.switch_to(Role::Admin));
        assert_eq!(active.active(), Role::Vendor);

        assert!(active.switch_to(Role::Customer));
        assert_eq!(active.active(), Role::Customer);
    }

    #[test]
    fn test_flags_follow_active_role_only() {
        let mut active =
            ActiveRole::resolve(RoleSet::from_grants([Role::Admin, Role::Vendor]), None);
        assert!(active.is_admin());
        assert!(active.switch_to(Role::Vendor));
        assert!(!active.is_admin());
        assert!(active.is_vendor());
        assert!(!active.is_customer());
    }

    #[test]
    fn test_role_round_trips_through_str() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_home_paths() {
        assert_eq!(Role::Admin.home_path(), "/admin");
        assert_eq!(Role::Vendor.home_path(), "/vendor");
        assert_eq!(Role::Customer.home_path(), "/dashboard");
    }
}
