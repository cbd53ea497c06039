//! Shared fixtures for the Mandir Bazaar integration tests.
//!
//! Most tests run entirely in memory: the auth/role context is driven by a
//! fake session source and fixed role grants, and device storage is
//! [`MemoryStorage`]. Tests marked `#[ignore]` need a `PostgreSQL` database:
//!
//! ```bash
//! MANDIR_TEST_DATABASE_URL=postgres://localhost/mandir_test \
//!     cargo test -p mandir-integration-tests -- --ignored
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::path::Path;

use rust_decimal::Decimal;
use secrecy::SecretString;
use sqlx::PgPool;

use mandir_core::cart::CartLine;
use mandir_core::{CurrencyCode, Email, Price, ProductId, Role, UserId, VariantId, VendorId};
use mandir_storefront::app;
use mandir_storefront::config::StorefrontConfig;
use mandir_storefront::db::RepositoryError;
use mandir_storefront::models::CurrentUser;
use mandir_storefront::services::RoleSource;
use mandir_storefront::services::session_hub::{
    DeviceId, SessionChange, SessionError, SessionHub, SessionSource, SessionSubscription,
};
use mandir_storefront::state::AppState;

/// Environment variable naming the test database.
pub const TEST_DATABASE_URL_VAR: &str = "MANDIR_TEST_DATABASE_URL";

/// A cart line for product `product` with the given quantity and ceiling.
#[must_use]
pub fn line(product: i32, variant: Option<i32>, quantity: u32, ceiling: u32) -> CartLine {
    CartLine {
        product_id: ProductId::new(product),
        variant_id: variant.map(VariantId::new),
        title: format!("Puja item {product}"),
        variant_title: variant.map(|v| format!("Size {v}")),
        quantity,
        unit_price: Price::new(Decimal::new(25_000, 2), CurrencyCode::INR),
        stock_ceiling: ceiling,
        vendor_id: VendorId::new(7),
    }
}

/// A signed-in user.
#[must_use]
pub fn user(id: i32) -> CurrentUser {
    CurrentUser {
        id: UserId::new(id),
        email: Email::parse(&format!("bhakt{id}@example.org")).unwrap(),
    }
}

/// Session source backed by a [`SessionHub`] with a fixed starting session.
pub struct FakeSession {
    pub hub: SessionHub,
    pub device: DeviceId,
    pub current: Option<CurrentUser>,
}

impl FakeSession {
    #[must_use]
    pub fn new(current: Option<CurrentUser>) -> Self {
        Self {
            hub: SessionHub::new(),
            device: DeviceId::new(),
            current,
        }
    }
}

impl SessionSource for FakeSession {
    fn subscribe(&self) -> SessionSubscription {
        self.hub.subscribe(self.device)
    }

    async fn current_session(&self) -> Result<Option<CurrentUser>, SessionError> {
        Ok(self.current.clone())
    }

    async fn begin_session(&self, user: &CurrentUser) -> Result<(), SessionError> {
        self.hub
            .publish(self.device, SessionChange::SignedIn(user.clone()));
        Ok(())
    }

    async fn end_session(&self) -> Result<(), SessionError> {
        self.hub.publish(self.device, SessionChange::SignedOut);
        Ok(())
    }
}

/// Role source answering with fixed grants, or failing when `None`.
pub struct FixedRoles(pub Option<Vec<Role>>);

impl RoleSource for FixedRoles {
    async fn granted_roles(&self, _user_id: UserId) -> Result<Vec<Role>, RepositoryError> {
        self.0
            .clone()
            .ok_or(RepositoryError::Database(sqlx::Error::PoolTimedOut))
    }
}

/// Connect to the test database and run migrations.
pub async fn test_pool() -> PgPool {
    let url = std::env::var(TEST_DATABASE_URL_VAR)
        .unwrap_or_else(|_| panic!("{TEST_DATABASE_URL_VAR} must be set for ignored tests"));
    let pool = PgPool::connect(&url).await.unwrap();
    sqlx::migrate!("../storefront/migrations")
        .run(&pool)
        .await
        .unwrap();
    pool
}

/// A unique email for database tests.
#[must_use]
pub fn unique_email(tag: &str) -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{tag}-{nanos}@example.org")
}

/// The full storefront router over `pool`, with no email or SMS delivery.
///
/// Each call builds fresh state, so settings are read from the database
/// rather than an earlier router's cache.
#[must_use]
pub fn router(pool: PgPool) -> axum::Router {
    let config = StorefrontConfig {
        database_url: SecretString::from("postgres://unused"),
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        base_url: "http://localhost".to_owned(),
        session_secret: SecretString::from("integration-test-secret-integration-test-secret"),
        email: None,
        sms: None,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 0.0,
        sentry_traces_sample_rate: 0.0,
    };
    let state = AppState::new(config, pool).unwrap();
    app(state, Path::new("../storefront/static"))
}
