//! Database operations for the marketplace `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `users`, `user_password`, `profiles` - Accounts
//! - `user_roles` - Role grants (`app_role` enum); a trigger grants `customer`
//!   to every new user
//! - `products`, `product_variants` - Catalog rows read for stock ceilings
//! - `site_settings` - Singleton branding/maintenance row
//! - `verification_codes` - Pending one-time codes per `(user, channel)`
//! - `tower_sessions.session` - Session storage
//!
//! Queries are built at runtime with `sqlx::query_as` and `FromRow`, so the
//! crate compiles without a live database.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p mandir-cli -- migrate
//! ```

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub mod otp;
pub mod products;
pub mod roles;
pub mod settings;
pub mod users;

pub use otp::VerificationRepository;
pub use products::ProductRepository;
pub use roles::RoleRepository;
pub use settings::SettingsRepository;
pub use users::UserRepository;

/// Errors that can occur in repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique-constraint violation to `Conflict`, anything else to `Database`.
    pub(crate) fn from_insert(e: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return Self::Conflict(format!("{what} already exists"));
        }
        Self::Database(e)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
