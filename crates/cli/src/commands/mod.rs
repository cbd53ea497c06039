//! CLI command implementations.

pub mod maintenance;
pub mod migrate;
pub mod roles;

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;

/// Environment variable holding the database connection string.
pub const DATABASE_URL_VAR: &str = "MANDIR_DATABASE_URL";

/// Error connecting to the database.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Connect using `MANDIR_DATABASE_URL`.
pub async fn connect() -> Result<PgPool, ConnectError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var(DATABASE_URL_VAR)
        .map(SecretString::from)
        .map_err(|_| ConnectError::MissingEnvVar(DATABASE_URL_VAR))?;

    tracing::info!("Connecting to database...");
    Ok(PgPool::connect(database_url.expose_secret()).await?)
}
