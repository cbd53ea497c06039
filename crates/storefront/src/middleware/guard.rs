//! Route guard extractors.
//!
//! [`RoleContext`] resolves who is signed in on this device and which role
//! they are wearing. [`RequireRole`] turns that into a decision for a route:
//! render, redirect to sign-in, redirect to the active role's home, or
//! answer "not ready yet".
//!
//! # Example
//!
//! ```rust,ignore
//! async fn admin_home(guard: RequireRole<AdminOnly>) -> impl IntoResponse {
//!     format!("Namaste, {}", guard.user.email)
//! }
//! ```

use std::marker::PhantomData;
use std::time::Duration;

use axum::{
    extract::FromRequestParts,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use mandir_core::guard::{AllowedRoles, GuardDecision, LOGIN_PATH, evaluate};
use mandir_core::{Role, UserId};

use crate::error::{AppError, set_sentry_user};
use crate::models::session::CurrentUser;
use crate::services::auth_context::{AuthContext, AuthSnapshot, PgRoleSource};
use crate::services::session_hub::HubSession;
use crate::services::storage::SessionStorage;
use crate::state::AppState;

/// How long a request waits for roles before answering "not ready".
pub const RESOLVE_TIMEOUT: Duration = Duration::from_secs(5);

/// The auth/role context for this request's device.
pub struct RoleContext {
    pub context: AuthContext<HubSession, SessionStorage>,
    pub snapshot: AuthSnapshot,
}

impl RoleContext {
    /// The signed-in user, if any.
    #[must_use]
    pub const fn user(&self) -> Option<&CurrentUser> {
        self.snapshot.user.as_ref()
    }

    /// Roles granted to the signed-in user.
    #[must_use]
    pub fn granted(&self) -> &[Role] {
        self.snapshot
            .roles
            .as_ref()
            .map_or(&[][..], |roles| roles.granted().as_slice())
    }
}

impl FromRequestParts<AppState> for RoleContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer missing".to_owned()))?;

        let source = HubSession::attach(state.sessions().clone(), session.clone()).await?;
        let context = AuthContext::init(
            source,
            PgRoleSource::new(state.pool().clone()),
            SessionStorage::new(session),
        )
        .await;

        let snapshot = match context.resolved_within(RESOLVE_TIMEOUT).await {
            Some(snapshot) => snapshot,
            None => {
                tracing::warn!("auth context did not resolve in time");
                context.snapshot()
            }
        };

        if let Some(user) = &snapshot.user {
            set_sentry_user(&user.id, None);
        }

        Ok(Self { context, snapshot })
    }
}

/// Roles a guarded route admits.
pub trait RolePolicy: Send + Sync + 'static {
    fn allowed() -> AllowedRoles;
}

/// Any signed-in user.
pub struct AnyRole;

/// Users currently wearing `admin`.
pub struct AdminOnly;

/// Users currently wearing `vendor`.
pub struct VendorOnly;

/// Users currently wearing `customer`.
pub struct CustomerOnly;

impl RolePolicy for AnyRole {
    fn allowed() -> AllowedRoles {
        AllowedRoles::Any
    }
}

impl RolePolicy for AdminOnly {
    fn allowed() -> AllowedRoles {
        AllowedRoles::only(Role::Admin)
    }
}

impl RolePolicy for VendorOnly {
    fn allowed() -> AllowedRoles {
        AllowedRoles::only(Role::Vendor)
    }
}

impl RolePolicy for CustomerOnly {
    fn allowed() -> AllowedRoles {
        AllowedRoles::only(Role::Customer)
    }
}

/// Extractor admitting only users whose active role satisfies `P`.
pub struct RequireRole<P: RolePolicy> {
    pub user: CurrentUser,
    pub role: Role,
    pub auth: RoleContext,
    _policy: PhantomData<P>,
}

impl<P: RolePolicy> RequireRole<P> {
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.user.id
    }
}

/// Why a guarded route did not render.
#[derive(Debug)]
pub enum GuardRejection {
    /// Not signed in; go to the sign-in screen.
    RedirectToLogin,
    /// Not signed in on an API path.
    Unauthorized,
    /// Signed in with a role this route does not admit.
    RedirectHome(&'static str),
    /// Auth state is still resolving.
    Pending,
    /// The context could not be built.
    Failed(AppError),
}

impl IntoResponse for GuardRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to(LOGIN_PATH).into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            Self::RedirectHome(path) => Redirect::to(path).into_response(),
            Self::Pending => (
                StatusCode::SERVICE_UNAVAILABLE,
                [(RETRY_AFTER, HeaderValue::from_static("1"))],
                "Loading, please retry",
            )
                .into_response(),
            Self::Failed(err) => err.into_response(),
        }
    }
}

/// Map a guard decision to a rejection, or `None` to render.
#[must_use]
pub fn rejection_for(decision: GuardDecision, path: &str) -> Option<GuardRejection> {
    match decision {
        GuardDecision::Render => None,
        GuardDecision::Pending => Some(GuardRejection::Pending),
        GuardDecision::RedirectToLogin if path.starts_with("/api/") => {
            Some(GuardRejection::Unauthorized)
        }
        GuardDecision::RedirectToLogin => Some(GuardRejection::RedirectToLogin),
        GuardDecision::RedirectHome(home) => Some(GuardRejection::RedirectHome(home)),
    }
}

impl<P: RolePolicy> FromRequestParts<AppState> for RequireRole<P> {
    type Rejection = GuardRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = RoleContext::from_request_parts(parts, state)
            .await
            .map_err(GuardRejection::Failed)?;

        let decision = evaluate(auth.snapshot.viewer(), &P::allowed());
        if let Some(rejection) = rejection_for(decision, parts.uri.path()) {
            tracing::debug!(path = %parts.uri.path(), ?decision, "guard rejected request");
            return Err(rejection);
        }

        let (Some(user), Some(role)) = (auth.snapshot.user.clone(), auth.snapshot.active_role())
        else {
            return Err(GuardRejection::Pending);
        };

        Ok(Self {
            user,
            role,
            auth,
            _policy: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_paths_get_401_instead_of_redirect() {
        assert!(matches!(
            rejection_for(GuardDecision::RedirectToLogin, "/api/cart"),
            Some(GuardRejection::Unauthorized)
        ));
        assert!(matches!(
            rejection_for(GuardDecision::RedirectToLogin, "/admin"),
            Some(GuardRejection::RedirectToLogin)
        ));
    }

    #[test]
    fn test_redirect_home_targets_role_home() {
        let rejection = rejection_for(GuardDecision::RedirectHome("/vendor"), "/admin");
        let response = rejection.map(IntoResponse::into_response);
        let location = response
            .as_ref()
            .and_then(|r| r.headers().get("location"))
            .and_then(|v| v.to_str().ok());
        assert_eq!(location, Some("/vendor"));
    }

    #[test]
    fn test_pending_is_503() {
        let response = GuardRejection::Pending.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(rejection_for(GuardDecision::Render, "/admin").is_none());
    }

    #[test]
    fn test_policies() {
        assert!(AnyRole::allowed().admits(Role::Customer));
        assert!(AdminOnly::allowed().admits(Role::Admin));
        assert!(!AdminOnly::allowed().admits(Role::Vendor));
        assert!(VendorOnly::allowed().admits(Role::Vendor));
        assert!(!VendorOnly::allowed().admits(Role::Customer));
        assert!(CustomerOnly::allowed().admits(Role::Customer));
        assert!(!CustomerOnly::allowed().admits(Role::Admin));
    }
}
