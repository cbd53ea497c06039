//! User repository for database operations.
//!
//! Accounts, password hashes and profiles. Role grants live in
//! [`super::roles`].

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use mandir_core::{Email, UserId};

use super::RepositoryError;
use crate::models::user::{Profile, User};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i32,
    email: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        Ok(Self {
            id: UserId::new(row.id),
            email,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserWithHashRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: Option<String>,
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    user_id: i32,
    full_name: String,
    country: String,
    phone: Option<String>,
    email_verified_at: Option<DateTime<Utc>>,
    phone_verified_at: Option<DateTime<Utc>>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Self {
            user_id: UserId::new(row.user_id),
            full_name: row.full_name,
            country: row.country,
            phone: row.phone,
            email_verified_at: row.email_verified_at,
            phone_verified_at: row.phone_verified_at,
        }
    }
}

/// Fields written at sign-up.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub email: &'a Email,
    pub password_hash: &'a str,
    pub full_name: &'a str,
    pub country: &'a str,
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the email in the database is invalid.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(
            r"
            SELECT id, email, created_at, updated_at
            FROM users
            WHERE email = $1
            ",
        )
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(
            r"
            SELECT id, email, created_at, updated_at
            FROM users
            WHERE id = $1
            ",
        )
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Create a user, their password and their profile in one transaction.
    ///
    /// The `customer` grant is added by the `users_default_customer_role`
    /// trigger.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create_with_password(&self, new: NewUser<'_>) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row: UserRow = sqlx::query_as(
            r"
            INSERT INTO users (email)
            VALUES ($1)
            RETURNING id, email, created_at, updated_at
            ",
        )
        .bind(new.email.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "email"))?;

        let user = User::try_from(row)?;

        sqlx::query(
            r"
            INSERT INTO user_password (user_id, password_hash)
            VALUES ($1, $2)
            ",
        )
        .bind(user.id.as_i32())
        .bind(new.password_hash)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
            INSERT INTO profiles (user_id, full_name, country)
            VALUES ($1, $2, $3)
            ",
        )
        .bind(user.id.as_i32())
        .bind(new.full_name)
        .bind(new.country)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(user)
    }

    /// Get a user and their password hash by email.
    ///
    /// Returns `None` if the user doesn't exist or has no password set.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row: Option<UserWithHashRow> = sqlx::query_as(
            r"
            SELECT u.id, u.email, u.created_at, u.updated_at, p.password_hash
            FROM users u
            LEFT JOIN user_password p ON u.id = p.user_id
            WHERE u.email = $1
            ",
        )
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let Some(password_hash) = row.password_hash else {
            return Ok(None);
        };

        Ok(Some((User::try_from(row.user)?, password_hash)))
    }

    /// Get a user's profile.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_profile(&self, user_id: UserId) -> Result<Option<Profile>, RepositoryError> {
        let row: Option<ProfileRow> = sqlx::query_as(
            r"
            SELECT user_id, full_name, country, phone, email_verified_at, phone_verified_at
            FROM profiles
            WHERE user_id = $1
            ",
        )
        .bind(user_id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Profile::from))
    }

    /// Record the phone number a user wants to verify.
    ///
    /// Changing the number clears any earlier phone verification.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no profile.
    pub async fn set_phone(&self, user_id: UserId, phone: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE profiles
            SET phone = $2,
                phone_verified_at = CASE WHEN phone = $2 THEN phone_verified_at END,
                updated_at = now()
            WHERE user_id = $1
            ",
        )
        .bind(user_id.as_i32())
        .bind(phone)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
