//! Maintenance mode toggle.
//!
//! Running storefronts cache settings for up to a minute, so the change
//! can take that long to show.

use mandir_storefront::db::{RepositoryError, SettingsRepository};

use super::{ConnectError, connect};

/// Errors that can occur while toggling maintenance mode.
#[derive(Debug, thiserror::Error)]
pub enum MaintenanceError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Turn maintenance mode on or off.
pub async fn set(enabled: bool) -> Result<(), MaintenanceError> {
    let pool = connect().await?;
    SettingsRepository::new(&pool).set_maintenance(enabled).await?;
    tracing::info!(
        "Maintenance mode {}",
        if enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}
