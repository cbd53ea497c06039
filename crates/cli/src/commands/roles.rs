//! Role grant management.
//!
//! Signed-in users pick up changes on their next request, when their
//! roles are fetched again.

use mandir_core::{Email, Role};
use mandir_storefront::db::{RepositoryError, RoleRepository, UserRepository};
use mandir_storefront::models::User;
use sqlx::PgPool;
use thiserror::Error;

use super::{ConnectError, connect};

/// Errors that can occur during role operations.
#[derive(Debug, Error)]
pub enum RoleCommandError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Invalid role.
    #[error("Invalid role: {0}. Valid roles: admin, vendor, customer")]
    InvalidRole(String),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// No account with that email.
    #[error("No user with email: {0}")]
    UnknownUser(String),
}

fn parse_role(role: &str) -> Result<Role, RoleCommandError> {
    role.parse()
        .map_err(|_| RoleCommandError::InvalidRole(role.to_owned()))
}

async fn find_user(pool: &PgPool, email: &str) -> Result<User, RoleCommandError> {
    let parsed = Email::parse(email).map_err(|_| RoleCommandError::InvalidEmail(email.to_owned()))?;
    UserRepository::new(pool)
        .get_by_email(&parsed)
        .await?
        .ok_or_else(|| RoleCommandError::UnknownUser(email.to_owned()))
}

/// Grant `role` to the user with `email`.
pub async fn grant(email: &str, role: &str) -> Result<(), RoleCommandError> {
    let role = parse_role(role)?;
    let pool = connect().await?;
    let user = find_user(&pool, email).await?;

    if RoleRepository::new(&pool).grant(user.id, role).await? {
        tracing::info!("Granted {} to {} (user {})", role, email, user.id);
    } else {
        tracing::info!("{} already holds {}", email, role);
    }
    Ok(())
}

/// Revoke `role` from the user with `email`.
///
/// Revoking the last role leaves the user with an empty set, which the
/// web tier treats as `customer`.
pub async fn revoke(email: &str, role: &str) -> Result<(), RoleCommandError> {
    let role = parse_role(role)?;
    let pool = connect().await?;
    let user = find_user(&pool, email).await?;

    if RoleRepository::new(&pool).revoke(user.id, role).await? {
        tracing::info!("Revoked {} from {} (user {})", role, email, user.id);
    } else {
        tracing::warn!("{} did not hold {}", email, role);
    }
    Ok(())
}

/// Log the roles held by the user with `email`.
pub async fn list(email: &str) -> Result<(), RoleCommandError> {
    let pool = connect().await?;
    let user = find_user(&pool, email).await?;

    let mut roles = RoleRepository::new(&pool).granted_roles(user.id).await?;
    roles.sort();
    let names: Vec<&str> = roles.iter().map(|r| r.as_str()).collect();
    tracing::info!("{} (user {}): {}", email, user.id, names.join(", "));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_role() {
        assert!(matches!(parse_role("vendor"), Ok(Role::Vendor)));
        assert!(matches!(
            parse_role("pujari"),
            Err(RoleCommandError::InvalidRole(r)) if r == "pujari"
        ));
    }
}
