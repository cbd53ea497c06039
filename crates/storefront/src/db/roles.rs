//! Role grant repository.
//!
//! The web tier only reads grants. Granting and revoking happen out of band
//! through `mandir-cli roles`.

use sqlx::PgPool;

use mandir_core::{Role, UserId};

use super::RepositoryError;

/// Repository for `user_roles`.
pub struct RoleRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> RoleRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All roles granted to a user, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn granted_roles(&self, user_id: UserId) -> Result<Vec<Role>, RepositoryError> {
        let roles = sqlx::query_scalar::<_, Role>(
            r"
            SELECT role
            FROM user_roles
            WHERE user_id = $1
            ",
        )
        .bind(user_id.as_i32())
        .fetch_all(self.pool)
        .await?;

        Ok(roles)
    }

    /// Grant a role. Returns `false` if it was already held.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn grant(&self, user_id: UserId, role: Role) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            INSERT INTO user_roles (user_id, role)
            VALUES ($1, $2)
            ON CONFLICT (user_id, role) DO NOTHING
            ",
        )
        .bind(user_id.as_i32())
        .bind(role)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Revoke a role. Returns `false` if it was not held.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn revoke(&self, user_id: UserId, role: Role) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM user_roles
            WHERE user_id = $1 AND role = $2
            ",
        )
        .bind(user_id.as_i32())
        .bind(role)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
