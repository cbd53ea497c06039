//! Authentication service.
//!
//! Email and password accounts. Every new account starts with the
//! `customer` role, granted by the database.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::PgPool;

use mandir_core::Email;

use crate::db::RepositoryError;
use crate::db::users::{NewUser, UserRepository};
use crate::models::session::CurrentUser;
use crate::models::user::User;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Longest accepted full name, in characters.
const MAX_NAME_LENGTH: usize = 120;

/// Sign-up form fields.
#[derive(Debug, Clone, Copy)]
pub struct SignUp<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub full_name: &'a str,
    pub country: &'a str,
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Register a new user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::InvalidName` if the full name is empty or too long.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn sign_up(&self, form: SignUp<'_>) -> Result<User, AuthError> {
        let email = Email::parse(form.email)?;
        validate_password(form.password)?;
        let full_name = validate_name(form.full_name)?;
        let country = form.country.trim();

        let password_hash = hash_password(form.password)?;

        let user = self
            .users
            .create_with_password(NewUser {
                email: &email,
                password_hash: &password_hash,
                full_name,
                country,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "account created");
        Ok(user)
    }

    /// Check an email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(user)
    }
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
        }
    }
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<&str, AuthError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AuthError::InvalidName("full name is required"));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(AuthError::InvalidName("full name is too long"));
    }
    Ok(name)
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
