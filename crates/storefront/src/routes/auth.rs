//! Authentication route handlers.
//!
//! Sign-in and sign-up go through the request's [`RoleContext`], so the
//! session event is published and roles are resolved before the redirect
//! to the role's home.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;

use mandir_core::Role;

use super::Chrome;
use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::RoleContext;
use crate::middleware::guard::RESOLVE_TIMEOUT;
use crate::models::session::CurrentUser;
use crate::services::auth::{AuthService, SignUp};
use crate::state::AppState;

/// Redirects to the active role's home once roles are known.
const ROLE_HOME_PATH: &str = "/home";

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub full_name: String,
    #[serde(default)]
    pub country: String,
}

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub chrome: Chrome,
    pub error: Option<String>,
    pub email: String,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub chrome: Chrome,
    pub error: Option<String>,
    pub email: String,
    pub full_name: String,
    pub country: String,
}

/// Display the login page.
///
/// Signed-in visitors go straight to their home.
#[instrument(skip(state, auth))]
pub async fn login_page(State(state): State<AppState>, auth: RoleContext) -> Response {
    if let Some(role) = auth.snapshot.active_role() {
        return Redirect::to(role.home_path()).into_response();
    }
    LoginTemplate {
        chrome: Chrome::new(&state, "Sign in", None).await,
        error: None,
        email: String::new(),
    }
    .into_response()
}

/// Handle login form submission.
#[instrument(skip(state, auth, form))]
pub async fn login(
    State(state): State<AppState>,
    auth: RoleContext,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    match AuthService::new(state.pool())
        .sign_in(&form.email, &form.password)
        .await
    {
        Ok(user) => {
            let current = CurrentUser::from(&user);
            let home = establish_session(&auth, &current).await?;
            tracing::info!(user_id = %user.id, "signed in");
            Ok(Redirect::to(home).into_response())
        }
        Err(e) => {
            let err = AppError::from(e);
            if err.status().is_server_error() {
                return Err(err);
            }
            tracing::info!("sign-in refused");
            Ok((
                StatusCode::UNAUTHORIZED,
                LoginTemplate {
                    chrome: Chrome::new(&state, "Sign in", None).await,
                    error: Some(err.public_message()),
                    email: form.email,
                },
            )
                .into_response())
        }
    }
}

/// Display the registration page.
#[instrument(skip(state, auth))]
pub async fn register_page(State(state): State<AppState>, auth: RoleContext) -> Response {
    if let Some(role) = auth.snapshot.active_role() {
        return Redirect::to(role.home_path()).into_response();
    }
    RegisterTemplate {
        chrome: Chrome::new(&state, "Create account", None).await,
        error: None,
        email: String::new(),
        full_name: String::new(),
        country: String::new(),
    }
    .into_response()
}

/// Handle registration form submission.
///
/// A new account holds only `customer`, so it lands on the customer home.
#[instrument(skip(state, auth, form))]
pub async fn register(
    State(state): State<AppState>,
    auth: RoleContext,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    if form.password != form.password_confirm {
        let message = "Passwords do not match".to_owned();
        return Ok(register_refused(&state, StatusCode::BAD_REQUEST, message, form).await);
    }

    let result = AuthService::new(state.pool())
        .sign_up(SignUp {
            email: &form.email,
            password: &form.password,
            full_name: &form.full_name,
            country: &form.country,
        })
        .await;

    match result {
        Ok(user) => {
            let home = establish_session(&auth, &CurrentUser::from(&user)).await?;
            Ok(Redirect::to(home).into_response())
        }
        Err(e) => {
            let err = AppError::from(e);
            let status = err.status();
            if status.is_server_error() {
                return Err(err);
            }
            Ok(register_refused(&state, status, err.public_message(), form).await)
        }
    }
}

async fn register_refused(
    state: &AppState,
    status: StatusCode,
    message: String,
    form: RegisterForm,
) -> Response {
    (
        status,
        RegisterTemplate {
            chrome: Chrome::new(state, "Create account", None).await,
            error: Some(message),
            email: form.email,
            full_name: form.full_name,
            country: form.country,
        },
    )
        .into_response()
}

/// Handle logout.
///
/// Role state is cleared before the session is touched.
#[instrument(skip(auth))]
pub async fn logout(auth: RoleContext) -> Result<Redirect, AppError> {
    auth.context.sign_out().await?;
    clear_sentry_user();
    Ok(Redirect::to("/"))
}

/// Sign `user` in on this device and return their home.
///
/// If roles do not resolve in time the visitor is sent to `/home`, which
/// resolves them again on the next request.
async fn establish_session(auth: &RoleContext, user: &CurrentUser) -> Result<&'static str, AppError> {
    auth.context.sign_in(user).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    let Some(resolved) = auth.context.resolved_within(RESOLVE_TIMEOUT).await else {
        tracing::warn!(user_id = %user.id, "roles not resolved after sign-in");
        return Ok(ROLE_HOME_PATH);
    };
    Ok(resolved
        .active_role()
        .map_or(Role::Customer.home_path(), Role::home_path))
}
