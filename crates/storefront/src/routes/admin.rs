//! Admin route handlers.
//!
//! Branding and maintenance mode are edited here. Saving refreshes the
//! settings cache, so the change shows on the next request.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::instrument;

use super::Chrome;
use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{AdminOnly, RequireRole};
use crate::models::SiteSettings;
use crate::models::settings::SettingsUpdate;
use crate::state::AppState;

/// Settings form values.
///
/// Filled from the saved row, or from a rejected submission so the admin
/// does not lose their edits.
#[derive(Debug, Clone)]
pub struct SettingsForm {
    pub site_name: String,
    pub tagline: String,
    pub logo_url: String,
    pub favicon_url: String,
    pub font_family: String,
    pub primary_color: String,
    pub accent_color: String,
    pub maintenance_mode: bool,
    pub maintenance_message: String,
    pub commission_rate: String,
    pub otp_email_subject: String,
    pub otp_email_intro: String,
}

impl From<&SiteSettings> for SettingsForm {
    fn from(s: &SiteSettings) -> Self {
        Self {
            site_name: s.site_name.clone(),
            tagline: s.tagline.clone(),
            logo_url: s.logo_url.clone().unwrap_or_default(),
            favicon_url: s.favicon_url.clone().unwrap_or_default(),
            font_family: s.font_family.clone(),
            primary_color: s.primary_color.clone(),
            accent_color: s.accent_color.clone(),
            maintenance_mode: s.maintenance_mode,
            maintenance_message: s.maintenance_message.clone(),
            commission_rate: s.commission_rate.normalize().to_string(),
            otp_email_subject: s.otp_email_subject.clone(),
            otp_email_intro: s.otp_email_intro.clone(),
        }
    }
}

impl From<&SettingsUpdate> for SettingsForm {
    fn from(u: &SettingsUpdate) -> Self {
        Self {
            site_name: u.site_name.clone(),
            tagline: u.tagline.clone(),
            logo_url: u.logo_url.clone().unwrap_or_default(),
            favicon_url: u.favicon_url.clone().unwrap_or_default(),
            font_family: u.font_family.clone(),
            primary_color: u.primary_color.clone(),
            accent_color: u.accent_color.clone(),
            maintenance_mode: u.maintenance_enabled(),
            maintenance_message: u.maintenance_message.clone(),
            commission_rate: u.commission_rate.normalize().to_string(),
            otp_email_subject: u.otp_email_subject.clone(),
            otp_email_intro: u.otp_email_intro.clone(),
        }
    }
}

/// Settings page template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/settings.html")]
pub struct SettingsTemplate {
    pub chrome: Chrome,
    pub form: SettingsForm,
    pub error: Option<String>,
    pub saved: bool,
}

/// Display the settings form.
#[instrument(skip(state, guard), fields(user_id = %guard.user_id()))]
pub async fn settings_page(
    State(state): State<AppState>,
    guard: RequireRole<AdminOnly>,
) -> impl IntoResponse {
    let chrome = Chrome::new(&state, "Site settings", Some(&guard.auth)).await;
    SettingsTemplate {
        form: SettingsForm::from(chrome.settings.as_ref()),
        chrome,
        error: None,
        saved: false,
    }
}

/// Save the settings form.
///
/// Every field is validated before anything is written.
#[instrument(skip(state, guard, update), fields(user_id = %guard.user_id()))]
pub async fn save_settings(
    State(state): State<AppState>,
    guard: RequireRole<AdminOnly>,
    Form(update): Form<SettingsUpdate>,
) -> Result<Response> {
    if let Err(e) = update.validate() {
        tracing::debug!(field = e.field, "settings rejected");
        let chrome = Chrome::new(&state, "Site settings", Some(&guard.auth)).await;
        return Ok((
            StatusCode::BAD_REQUEST,
            SettingsTemplate {
                chrome,
                form: SettingsForm::from(&update),
                error: Some(e.to_string()),
                saved: false,
            },
        )
            .into_response());
    }

    let saved = state.settings().update(&update).await?;
    add_breadcrumb(
        "admin",
        "site settings saved",
        Some(&[(
            "maintenance",
            if saved.maintenance_mode { "on" } else { "off" },
        )]),
    );

    let chrome = Chrome::new(&state, "Site settings", Some(&guard.auth)).await;
    Ok(SettingsTemplate {
        form: SettingsForm::from(saved.as_ref()),
        chrome,
        error: None,
        saved: true,
    }
    .into_response())
}
