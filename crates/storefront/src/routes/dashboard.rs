//! Role home pages.
//!
//! Each home admits only its own active role; anyone else is sent to the
//! home of the role they are wearing.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use mandir_core::VendorId;
use mandir_core::verification::OtpChannel;

use super::Chrome;
use crate::db::{ProductRepository, UserRepository};
use crate::error::Result;
use crate::filters;
use crate::middleware::{AdminOnly, CustomerOnly, RequireRole, VendorOnly};
use crate::models::user::Profile;
use crate::state::AppState;

/// Customer home template.
#[derive(Template, WebTemplate)]
#[template(path = "dashboard/customer.html")]
pub struct CustomerDashboardTemplate {
    pub chrome: Chrome,
    pub email: String,
    pub profile: Option<Profile>,
    pub email_channel: bool,
    pub phone_channel: bool,
}

impl CustomerDashboardTemplate {
    #[must_use]
    pub fn email_verified(&self) -> bool {
        self.profile
            .as_ref()
            .is_some_and(Profile::email_verified)
    }

    #[must_use]
    pub fn phone_verified(&self) -> bool {
        self.profile
            .as_ref()
            .is_some_and(Profile::phone_verified)
    }

    #[must_use]
    pub fn phone(&self) -> &str {
        self.profile
            .as_ref()
            .and_then(|p| p.phone.as_deref())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        self.profile
            .as_ref()
            .map(|p| p.full_name.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.email)
    }
}

/// Vendor home template.
#[derive(Template, WebTemplate)]
#[template(path = "dashboard/vendor.html")]
pub struct VendorDashboardTemplate {
    pub chrome: Chrome,
    pub product_count: i64,
    pub commission_rate: String,
}

/// Admin home template.
#[derive(Template, WebTemplate)]
#[template(path = "dashboard/admin.html")]
pub struct AdminDashboardTemplate {
    pub chrome: Chrome,
    pub maintenance_mode: bool,
    pub email_channel: bool,
    pub phone_channel: bool,
}

/// Customer home.
#[instrument(skip(state, guard), fields(user_id = %guard.user_id()))]
pub async fn customer(
    State(state): State<AppState>,
    guard: RequireRole<CustomerOnly>,
) -> Result<impl IntoResponse> {
    let profile = UserRepository::new(state.pool())
        .get_profile(guard.user_id())
        .await?;
    let otp = state.otp();

    Ok(CustomerDashboardTemplate {
        chrome: Chrome::new(&state, "My account", Some(&guard.auth)).await,
        email: guard.user.email.to_string(),
        profile,
        email_channel: otp.is_available(OtpChannel::Email),
        phone_channel: otp.is_available(OtpChannel::Phone),
    })
}

/// Vendor home.
///
/// A vendor's listings are keyed by their user id.
#[instrument(skip(state, guard), fields(user_id = %guard.user_id()))]
pub async fn vendor(
    State(state): State<AppState>,
    guard: RequireRole<VendorOnly>,
) -> Result<impl IntoResponse> {
    let vendor_id = VendorId::new(guard.user_id().as_i32());
    let product_count = ProductRepository::new(state.pool())
        .count_for_vendor(vendor_id)
        .await?;
    let chrome = Chrome::new(&state, "Vendor", Some(&guard.auth)).await;
    let commission_rate = chrome.settings.commission_rate.normalize().to_string();

    Ok(VendorDashboardTemplate {
        chrome,
        product_count,
        commission_rate,
    })
}

/// Admin home.
#[instrument(skip(state, guard), fields(user_id = %guard.user_id()))]
pub async fn admin(
    State(state): State<AppState>,
    guard: RequireRole<AdminOnly>,
) -> impl IntoResponse {
    let chrome = Chrome::new(&state, "Admin", Some(&guard.auth)).await;
    let otp = state.otp();

    AdminDashboardTemplate {
        maintenance_mode: chrome.settings.maintenance_mode,
        chrome,
        email_channel: otp.is_available(OtpChannel::Email),
        phone_channel: otp.is_available(OtpChannel::Phone),
    }
}
