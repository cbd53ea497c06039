//! Route guard decision table.
//!
//! Given who is looking (still resolving, anonymous, or signed in wearing a
//! particular role) and which roles a route admits, decide whether to render,
//! wait, or redirect. Denials are never errors: they are redirects.

use crate::types::Role;

/// Path of the sign-in screen.
pub const LOGIN_PATH: &str = "/auth/login";

/// Roles admitted by a guarded route.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AllowedRoles {
    /// Any signed-in user.
    #[default]
    Any,
    /// Only users whose active role is listed.
    Only(Vec<Role>),
}

impl AllowedRoles {
    /// Admit a single role.
    #[must_use]
    pub fn only(role: Role) -> Self {
        Self::Only(vec![role])
    }

    /// Whether a user wearing `role` is admitted.
    #[must_use]
    pub fn admits(&self, role: Role) -> bool {
        match self {
            Self::Any => true,
            Self::Only(roles) => roles.contains(&role),
        }
    }
}

/// The viewer as seen by a guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    /// Auth state is still resolving.
    Loading,
    /// No session.
    Anonymous,
    /// Signed in, wearing the given active role.
    SignedIn(Role),
}

/// What a guarded route should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Show a neutral loading state and take no action.
    Pending,
    /// Send the viewer to the sign-in screen.
    RedirectToLogin,
    /// Send the viewer to their active role's home.
    RedirectHome(&'static str),
    /// Render the guarded content.
    Render,
}

/// Decide what a guarded route does for a viewer.
///
/// The decision depends on the active role, not on every role granted: a
/// user holding `admin` who has switched to `vendor` is sent to the vendor
/// home from admin-only routes.
#[must_use]
pub fn evaluate(viewer: Viewer, allowed: &AllowedRoles) -> GuardDecision {
    match viewer {
        Viewer::Loading => GuardDecision::Pending,
        Viewer::Anonymous => GuardDecision::RedirectToLogin,
        Viewer::SignedIn(role) if allowed.admits(role) => GuardDecision::Render,
        Viewer::SignedIn(role) => GuardDecision::RedirectHome(role.home_path()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loading_takes_no_action() {
        assert_eq!(
            evaluate(Viewer::Loading, &AllowedRoles::only(Role::Admin)),
            GuardDecision::Pending
        );
        assert_eq!(
            evaluate(Viewer::Loading, &AllowedRoles::Any),
            GuardDecision::Pending
        );
    }

    #[test]
    fn test_anonymous_goes_to_login() {
        assert_eq!(
            evaluate(Viewer::Anonymous, &AllowedRoles::Any),
            GuardDecision::RedirectToLogin
        );
    }

    #[test]
    fn test_any_admits_every_role() {
        for role in Role::ALL {
            assert_eq!(
                evaluate(Viewer::SignedIn(role), &AllowedRoles::Any),
                GuardDecision::Render
            );
        }
    }

    #[test]
    fn test_wrong_role_is_sent_to_own_home() {
        let admin_only = AllowedRoles::only(Role::Admin);
        assert_eq!(
            evaluate(Viewer::SignedIn(Role::Vendor), &admin_only),
            GuardDecision::RedirectHome("/vendor")
        );
        assert_eq!(
            evaluate(Viewer::SignedIn(Role::Customer), &admin_only),
            GuardDecision::RedirectHome("/dashboard")
        );
        assert_eq!(
            evaluate(
                Viewer::SignedIn(Role::Admin),
                &AllowedRoles::only(Role::Vendor)
            ),
            GuardDecision::RedirectHome("/admin")
        );
    }

    #[test]
    fn test_listed_role_renders() {
        let allowed = AllowedRoles::Only(vec![Role::Admin, Role::Vendor]);
        assert_eq!(
            evaluate(Viewer::SignedIn(Role::Vendor), &allowed),
            GuardDecision::Render
        );
    }
}
