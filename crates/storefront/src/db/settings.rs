//! Site settings repository (singleton row `id = 1`).

use sqlx::PgPool;

use super::RepositoryError;
use crate::models::settings::{SettingsUpdate, SiteSettings};

const SELECT_SETTINGS: &str = r"
    SELECT site_name, tagline, logo_url, favicon_url, font_family,
           primary_color, accent_color, maintenance_mode, maintenance_message,
           commission_rate, otp_email_subject, otp_email_intro, updated_at
    FROM site_settings
    WHERE id = 1
";

/// Repository for `site_settings`.
pub struct SettingsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SettingsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Load the settings row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the row was never seeded.
    pub async fn get(&self) -> Result<SiteSettings, RepositoryError> {
        sqlx::query_as::<_, SiteSettings>(SELECT_SETTINGS)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Overwrite the settings row from the admin form.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update(&self, form: &SettingsUpdate) -> Result<SiteSettings, RepositoryError> {
        let blank_to_none = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        };

        let settings = sqlx::query_as::<_, SiteSettings>(
            r"
            UPDATE site_settings
            SET site_name = $1, tagline = $2, logo_url = $3, favicon_url = $4,
                font_family = $5, primary_color = $6, accent_color = $7,
                maintenance_mode = $8, maintenance_message = $9,
                commission_rate = $10, otp_email_subject = $11, otp_email_intro = $12,
                updated_at = now()
            WHERE id = 1
            RETURNING site_name, tagline, logo_url, favicon_url, font_family,
                      primary_color, accent_color, maintenance_mode, maintenance_message,
                      commission_rate, otp_email_subject, otp_email_intro, updated_at
            ",
        )
        .bind(form.site_name.trim())
        .bind(form.tagline.trim())
        .bind(blank_to_none(&form.logo_url))
        .bind(blank_to_none(&form.favicon_url))
        .bind(form.font_family.trim())
        .bind(form.primary_color.trim())
        .bind(form.accent_color.trim())
        .bind(form.maintenance_enabled())
        .bind(form.maintenance_message.trim())
        .bind(form.commission_rate)
        .bind(form.otp_email_subject.trim())
        .bind(form.otp_email_intro.trim())
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(settings)
    }

    /// Turn maintenance mode on or off.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the row was never seeded.
    pub async fn set_maintenance(&self, enabled: bool) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE site_settings
            SET maintenance_mode = $1, updated_at = now()
            WHERE id = 1
            ",
        )
        .bind(enabled)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
