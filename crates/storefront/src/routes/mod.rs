//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Home page (catalog teaser)
//! GET  /home                   - Redirect to the active role's home
//! GET  /branding.css           - CSS variables from site settings
//!
//! # Cart (fragments with HX-Trigger side effects)
//! GET  /cart                   - Cart page
//! POST /cart/add               - Add to cart
//! POST /cart/update            - Set a line's quantity
//! POST /cart/remove            - Remove a line
//! GET  /cart/count             - Cart count badge
//!
//! # Auth
//! GET  /auth/login             - Login page
//! POST /auth/login             - Login action
//! GET  /auth/register          - Register page
//! POST /auth/register          - Register action
//! POST /auth/logout            - Logout action
//!
//! # Account (signed in)
//! POST /account/role           - Switch active role
//! POST /verify/send            - Send an email or phone code
//! POST /verify/confirm         - Confirm a code
//!
//! # Role homes
//! GET  /dashboard              - Customer home
//! GET  /vendor                 - Vendor home
//! GET  /admin                  - Admin home
//! GET  /admin/settings         - Site settings form
//! POST /admin/settings         - Save site settings
//! ```

pub mod account;
pub mod admin;
pub mod auth;
pub mod branding;
pub mod cart;
pub mod dashboard;
pub mod home;
pub mod verify;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use mandir_core::Role;

use crate::middleware::{
    RoleContext, auth_rate_limiter, cart_rate_limiter, verification_rate_limiter,
};
use crate::models::SiteSettings;
use crate::state::AppState;

/// Data every full page needs for its layout.
pub struct Chrome {
    pub settings: Arc<SiteSettings>,
    pub title: String,
    pub email: Option<String>,
    pub active_role: Option<Role>,
    pub roles: Vec<Role>,
}

impl Chrome {
    /// Layout data for a page titled `page`.
    pub async fn new(state: &AppState, page: &str, auth: Option<&RoleContext>) -> Self {
        let settings = state.settings().current().await;
        let title = settings.page_title(page);
        let (email, active_role, roles) = auth.map_or((None, None, Vec::new()), |auth| {
            (
                auth.user().map(|u| u.email.to_string()),
                auth.snapshot.active_role(),
                auth.granted().to_vec(),
            )
        });
        Self {
            settings,
            title,
            email,
            active_role,
            roles,
        }
    }

    /// Whether the role switcher has anything to offer.
    #[must_use]
    pub fn can_switch(&self) -> bool {
        self.roles.len() > 1
    }

    /// Whether `role` is the one being worn.
    #[must_use]
    pub fn is_active(&self, role: &Role) -> bool {
        self.active_role == Some(*role)
    }

    /// Home of the active role, if signed in.
    #[must_use]
    pub fn home_path(&self) -> Option<&'static str> {
        self.active_role.map(Role::home_path)
    }
}

/// Create the auth routes router.
///
/// Only form submissions are rate limited.
pub fn auth_routes() -> Router<AppState> {
    let limiter = auth_rate_limiter();
    Router::new()
        .route(
            "/login",
            get(auth::login_page).merge(post(auth::login).layer(limiter.clone())),
        )
        .route(
            "/register",
            get(auth::register_page).merge(post(auth::register).layer(limiter)),
        )
        .route("/logout", post(auth::logout))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    let mutations = Router::new()
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .layer(cart_rate_limiter());

    Router::new()
        .route("/", get(cart::show))
        .route("/count", get(cart::count))
        .merge(mutations)
}

/// Create the verification routes router.
pub fn verify_routes() -> Router<AppState> {
    Router::new()
        .route("/send", post(verify::send))
        .route("/confirm", post(verify::confirm))
        .layer(verification_rate_limiter())
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard::admin))
        .route("/settings", get(admin::settings_page).post(admin::save_settings))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/home", get(home::role_home))
        .route("/branding.css", get(branding::stylesheet))
        .nest("/cart", cart_routes())
        .nest("/auth", auth_routes())
        .route("/account/role", post(account::switch_role))
        .nest("/verify", verify_routes())
        .route("/dashboard", get(dashboard::customer))
        .route("/vendor", get(dashboard::vendor))
        .nest("/admin", admin_routes())
}
