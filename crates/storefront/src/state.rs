//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::services::email::EmailService;
use crate::services::otp::OtpService;
use crate::services::session_hub::SessionHub;
use crate::services::settings::SettingsService;
use crate::services::sms::{SmsClient, SmsError};

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("invalid SMTP configuration: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("invalid SMS configuration: {0}")]
    Sms(#[from] SmsError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    sessions: SessionHub,
    settings: SettingsService,
    email: Option<EmailService>,
    sms: Option<SmsClient>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Email and SMS delivery are enabled only when configured.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured delivery provider cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let email = config.email.as_ref().map(EmailService::new).transpose()?;
        let sms = config.sms.as_ref().map(SmsClient::new).transpose()?;

        if email.is_none() {
            tracing::warn!("SMTP not configured; email verification disabled");
        }
        if sms.is_none() {
            tracing::warn!("SMS gateway not configured; phone verification disabled");
        }

        let settings = SettingsService::new(pool.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                sessions: SessionHub::new(),
                settings,
                email,
                sms,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Session-change bus.
    #[must_use]
    pub fn sessions(&self) -> &SessionHub {
        &self.inner.sessions
    }

    /// Cached site settings.
    #[must_use]
    pub fn settings(&self) -> &SettingsService {
        &self.inner.settings
    }

    /// Verification code service over the configured providers.
    #[must_use]
    pub fn otp(&self) -> OtpService<'_> {
        OtpService::new(
            &self.inner.pool,
            self.inner.email.as_ref(),
            self.inner.sms.as_ref(),
        )
    }
}
