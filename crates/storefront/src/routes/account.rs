//! Account route handlers.
//!
//! These routes require authentication.

use axum::{Form, response::Redirect};
use serde::Deserialize;
use tracing::instrument;

use mandir_core::Role;

use crate::middleware::{AnyRole, RequireRole};

/// Role switch form data.
#[derive(Debug, Deserialize)]
pub struct SwitchRoleForm {
    pub role: Role,
}

/// Switch the active role and go to its home.
///
/// A role the user does not hold is ignored and they stay on their current
/// home.
#[instrument(skip(guard), fields(user_id = %guard.user_id()))]
pub async fn switch_role(
    guard: RequireRole<AnyRole>,
    Form(form): Form<SwitchRoleForm>,
) -> Redirect {
    let target = if guard.auth.context.switch_role(form.role).await {
        form.role
    } else {
        guard.role
    };
    Redirect::to(target.home_path())
}
