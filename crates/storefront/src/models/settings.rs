//! Site-wide settings and the branding derived from them.
//!
//! Colours and font names end up inside a stylesheet and a URL, so they are
//! validated on the way out as well as on the way in: anything that does not
//! look like a hex colour or a plain font family name falls back to the
//! default.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

pub const DEFAULT_SITE_NAME: &str = "Mandir Bazaar";
pub const DEFAULT_FONT: &str = "Poppins";
pub const DEFAULT_PRIMARY: &str = "#c2410c";
pub const DEFAULT_ACCENT: &str = "#f59e0b";
pub const DEFAULT_FAVICON: &str = "/static/favicon.svg";

const MAX_FONT_NAME_LEN: usize = 64;
const FONT_WEIGHTS: &str = "wght@400;500;600;700";

/// The singleton `site_settings` row.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SiteSettings {
    pub site_name: String,
    pub tagline: String,
    pub logo_url: Option<String>,
    pub favicon_url: Option<String>,
    pub font_family: String,
    pub primary_color: String,
    pub accent_color: String,
    pub maintenance_mode: bool,
    pub maintenance_message: String,
    pub commission_rate: Decimal,
    pub otp_email_subject: String,
    pub otp_email_intro: String,
    pub updated_at: DateTime<Utc>,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            site_name: DEFAULT_SITE_NAME.to_owned(),
            tagline: String::new(),
            logo_url: None,
            favicon_url: None,
            font_family: DEFAULT_FONT.to_owned(),
            primary_color: DEFAULT_PRIMARY.to_owned(),
            accent_color: DEFAULT_ACCENT.to_owned(),
            maintenance_mode: false,
            maintenance_message: "We are making a few improvements. Please check back shortly."
                .to_owned(),
            commission_rate: Decimal::new(10, 0),
            otp_email_subject: "Your verification code".to_owned(),
            otp_email_intro: "Use the code below to verify your account.".to_owned(),
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

impl SiteSettings {
    /// Font family, or the default if the stored value is unusable.
    #[must_use]
    pub fn font(&self) -> &str {
        if is_font_name(&self.font_family) {
            self.font_family.trim()
        } else {
            DEFAULT_FONT
        }
    }

    /// Primary colour, or the default if the stored value is not a hex colour.
    #[must_use]
    pub fn primary(&self) -> &str {
        valid_hex_or(&self.primary_color, DEFAULT_PRIMARY)
    }

    /// Accent colour, or the default if the stored value is not a hex colour.
    #[must_use]
    pub fn accent(&self) -> &str {
        valid_hex_or(&self.accent_color, DEFAULT_ACCENT)
    }

    /// CSS custom properties for the `:root` rule.
    #[must_use]
    pub fn css_variables(&self) -> String {
        format!(
            ":root {{\n  --font-family: '{}', system-ui, sans-serif;\n  --primary: {};\n  --accent: {};\n}}\n",
            self.font(),
            self.primary(),
            self.accent()
        )
    }

    /// Google Fonts `css2` stylesheet for the configured family.
    #[must_use]
    pub fn font_stylesheet_url(&self) -> String {
        format!(
            "https://fonts.googleapis.com/css2?family={}:{FONT_WEIGHTS}&display=swap",
            self.font().replace(' ', "+")
        )
    }

    /// Document title for a page.
    #[must_use]
    pub fn page_title(&self, page: &str) -> String {
        if page.is_empty() {
            self.site_name.clone()
        } else {
            format!("{page} | {}", self.site_name)
        }
    }

    /// Favicon URL, falling back to the bundled icon.
    #[must_use]
    pub fn favicon(&self) -> &str {
        self.favicon_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(DEFAULT_FAVICON)
    }
}

/// Admin form for updating settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsUpdate {
    pub site_name: String,
    #[serde(default)]
    pub tagline: String,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub favicon_url: Option<String>,
    pub font_family: String,
    pub primary_color: String,
    pub accent_color: String,
    /// Checkbox: present when ticked.
    #[serde(default)]
    pub maintenance_mode: Option<String>,
    #[serde(default)]
    pub maintenance_message: String,
    pub commission_rate: Decimal,
    pub otp_email_subject: String,
    pub otp_email_intro: String,
}

/// A rejected settings field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct SettingsValidationError {
    pub field: &'static str,
    pub message: &'static str,
}

impl SettingsUpdate {
    /// Whether the maintenance checkbox was ticked.
    #[must_use]
    pub fn maintenance_enabled(&self) -> bool {
        self.maintenance_mode.is_some()
    }

    /// Check every field before anything is written.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field.
    pub fn validate(&self) -> Result<(), SettingsValidationError> {
        let fail = |field, message| Err(SettingsValidationError { field, message });

        if self.site_name.trim().is_empty() {
            return fail("site_name", "must not be empty");
        }
        if !is_font_name(&self.font_family) {
            return fail("font_family", "letters, digits, spaces and hyphens only");
        }
        if !is_hex_color(&self.primary_color) {
            return fail("primary_color", "must be a hex colour like #c2410c");
        }
        if !is_hex_color(&self.accent_color) {
            return fail("accent_color", "must be a hex colour like #f59e0b");
        }
        if self.commission_rate < Decimal::ZERO || self.commission_rate > Decimal::ONE_HUNDRED {
            return fail("commission_rate", "must be between 0 and 100");
        }
        for (field, url) in [("logo_url", &self.logo_url), ("favicon_url", &self.favicon_url)] {
            if let Some(url) = url.as_deref().map(str::trim).filter(|u| !u.is_empty())
                && !(url.starts_with("https://") || url.starts_with('/'))
            {
                return fail(field, "must be an https:// or site-relative URL");
            }
        }
        Ok(())
    }
}

/// `#rgb` or `#rrggbb`.
#[must_use]
pub fn is_hex_color(s: &str) -> bool {
    let s = s.trim();
    s.strip_prefix('#').is_some_and(|hex| {
        matches!(hex.len(), 3 | 6) && hex.bytes().all(|b| b.is_ascii_hexdigit())
    })
}

/// A plain font family name such as `Noto Sans Devanagari`.
#[must_use]
pub fn is_font_name(s: &str) -> bool {
    let s = s.trim();
    !s.is_empty()
        && s.len() <= MAX_FONT_NAME_LEN
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-')
}

fn valid_hex_or<'a>(value: &'a str, default: &'a str) -> &'a str {
    if is_hex_color(value) {
        value.trim()
    } else {
        default
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn update() -> SettingsUpdate {
        SettingsUpdate {
            site_name: "Mandir Bazaar".to_owned(),
            tagline: String::new(),
            logo_url: None,
            favicon_url: Some("/static/om.png".to_owned()),
            font_family: "Noto Sans".to_owned(),
            primary_color: "#aa3300".to_owned(),
            accent_color: "#fc0".to_owned(),
            maintenance_mode: Some("on".to_owned()),
            maintenance_message: String::new(),
            commission_rate: Decimal::new(125, 1),
            otp_email_subject: "Code".to_owned(),
            otp_email_intro: "Hello".to_owned(),
        }
    }

    #[test]
    fn test_css_variables_use_settings() {
        let settings = SiteSettings {
            font_family: "Noto Sans Devanagari".to_owned(),
            primary_color: "#123abc".to_owned(),
            ..SiteSettings::default()
        };
        let css = settings.css_variables();
        assert!(css.contains("--font-family: 'Noto Sans Devanagari'"));
        assert!(css.contains("--primary: #123abc;"));
        assert!(css.contains(&format!("--accent: {DEFAULT_ACCENT};")));
    }

    #[test]
    fn test_invalid_branding_falls_back() {
        let settings = SiteSettings {
            font_family: "x'; } body { display:none".to_owned(),
            primary_color: "red".to_owned(),
            accent_color: "#12345".to_owned(),
            ..SiteSettings::default()
        };
        assert_eq!(settings.font(), DEFAULT_FONT);
        assert_eq!(settings.primary(), DEFAULT_PRIMARY);
        assert_eq!(settings.accent(), DEFAULT_ACCENT);
    }

    #[test]
    fn test_font_stylesheet_url() {
        let settings = SiteSettings {
            font_family: "Noto Serif".to_owned(),
            ..SiteSettings::default()
        };
        assert_eq!(
            settings.font_stylesheet_url(),
            "https://fonts.googleapis.com/css2?family=Noto+Serif:wght@400;500;600;700&display=swap"
        );
    }

    #[test]
    fn test_page_title_and_favicon() {
        let settings = SiteSettings::default();
        assert_eq!(settings.page_title("Cart"), "Cart | Mandir Bazaar");
        assert_eq!(settings.page_title(""), "Mandir Bazaar");
        assert_eq!(settings.favicon(), DEFAULT_FAVICON);
    }

    #[test]
    fn test_update_validation() {
        assert!(update().validate().is_ok());
        assert!(update().maintenance_enabled());

        let bad = SettingsUpdate {
            primary_color: "orange".to_owned(),
            ..update()
        };
        assert_eq!(bad.validate().unwrap_err().field, "primary_color");

        let bad = SettingsUpdate {
            commission_rate: Decimal::new(101, 0),
            ..update()
        };
        assert_eq!(bad.validate().unwrap_err().field, "commission_rate");

        let bad = SettingsUpdate {
            logo_url: Some("javascript:alert(1)".to_owned()),
            ..update()
        };
        assert_eq!(bad.validate().unwrap_err().field, "logo_url");
    }
}
