//! Cached access to the site settings row.
//!
//! Every page needs branding and the maintenance flag, so the row is kept in
//! a `moka` cache for a minute and replaced whenever an admin writes it.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;

use crate::db::{RepositoryError, SettingsRepository};
use crate::models::SiteSettings;
use crate::models::settings::SettingsUpdate;

const SETTINGS_TTL: Duration = Duration::from_secs(60);

/// Settings cache shared by every request.
#[derive(Clone)]
pub struct SettingsService {
    pool: PgPool,
    cache: Cache<(), Arc<SiteSettings>>,
}

impl SettingsService {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        let cache = Cache::builder()
            .max_capacity(1)
            .time_to_live(SETTINGS_TTL)
            .build();
        Self { pool, cache }
    }

    /// Current settings.
    ///
    /// Falls back to the built-in defaults if the row cannot be read; the
    /// fallback is not cached.
    pub async fn current(&self) -> Arc<SiteSettings> {
        if let Some(settings) = self.cache.get(&()).await {
            return settings;
        }
        match SettingsRepository::new(&self.pool).get().await {
            Ok(settings) => {
                let settings = Arc::new(settings);
                self.cache.insert((), Arc::clone(&settings)).await;
                settings
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load site settings; using defaults");
                Arc::new(SiteSettings::default())
            }
        }
    }

    /// Save an admin's changes and refresh the cache.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the write fails.
    pub async fn update(&self, form: &SettingsUpdate) -> Result<Arc<SiteSettings>, RepositoryError> {
        let settings = Arc::new(SettingsRepository::new(&self.pool).update(form).await?);
        self.cache.insert((), Arc::clone(&settings)).await;
        tracing::info!(maintenance = settings.maintenance_mode, "site settings updated");
        Ok(settings)
    }
}
