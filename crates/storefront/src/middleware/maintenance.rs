//! Maintenance gate.
//!
//! While maintenance mode is on, every public page answers 503 with the
//! maintenance notice. Admin, auth, static and health routes stay reachable
//! so an administrator can sign in and switch it off.
//!
//! Anyone granted `admin` passes the gate whatever role they are wearing,
//! so an admin browsing as a vendor can still reach the role switcher.

use std::sync::Arc;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    middleware::Next,
    response::{IntoResponse, Response},
};

use mandir_core::Role;
use mandir_core::guard::LOGIN_PATH;

use crate::filters;
use crate::middleware::RoleContext;
use crate::models::SiteSettings;
use crate::state::AppState;

/// Path prefixes served during maintenance.
const EXEMPT_PREFIXES: [&str; 5] = ["/admin", "/auth", "/static", "/health", "/branding.css"];

/// Maintenance page.
#[derive(Template, WebTemplate)]
#[template(path = "maintenance.html")]
pub struct MaintenanceTemplate {
    pub settings: Arc<SiteSettings>,
    pub login_path: &'static str,
}

/// Whether `path` stays reachable during maintenance.
#[must_use]
pub fn is_exempt(path: &str) -> bool {
    EXEMPT_PREFIXES.iter().any(|prefix| {
        path.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

/// Whether a request is served while maintenance is on.
///
/// `granted` is every role the visitor holds, not only the active one.
#[must_use]
pub fn admits_during_maintenance(path: &str, granted: &[Role]) -> bool {
    is_exempt(path) || granted.contains(&Role::Admin)
}

/// Serve the maintenance page instead of public routes while enabled.
pub async fn maintenance_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if is_exempt(request.uri().path()) {
        return next.run(request).await;
    }

    let settings = state.settings().current().await;
    if !settings.maintenance_mode {
        return next.run(request).await;
    }

    let (mut parts, body) = request.into_parts();
    let granted = match RoleContext::from_request_parts(&mut parts, &state).await {
        Ok(auth) => auth.granted().to_vec(),
        Err(e) => {
            tracing::warn!(error = %e, "could not resolve roles behind maintenance gate");
            Vec::new()
        }
    };
    let request = Request::from_parts(parts, body);
    if admits_during_maintenance(request.uri().path(), &granted) {
        return next.run(request).await;
    }

    tracing::debug!(path = %request.uri().path(), "maintenance page served");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        [(RETRY_AFTER, HeaderValue::from_static("300"))],
        MaintenanceTemplate {
            settings,
            login_path: LOGIN_PATH,
        },
    )
        .into_response()
}
