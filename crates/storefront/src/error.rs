//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::models::settings::SettingsValidationError;
use crate::services::auth::AuthError;
use crate::services::otp::OtpError;
use crate::services::session_hub::SessionError;
use crate::services::storage::StorageError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Verification code operation failed.
    #[error("Verification error: {0}")]
    Otp(#[from] OtpError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Device storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Admin submitted invalid settings.
    #[error("Invalid settings: {0}")]
    Settings(#[from] SettingsValidationError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn is_server_error(&self) -> bool {
        match self {
            Self::Database(_) | Self::Session(_) | Self::Storage(_) | Self::Internal(_) => true,
            Self::Otp(err) => matches!(
                err,
                OtpError::Email(_) | OtpError::Sms(_) | OtpError::Repository(_)
            ),
            Self::Auth(err) => matches!(err, AuthError::Repository(_) | AuthError::PasswordHash),
            _ => false,
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Session(_) | Self::Storage(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_)
                | AuthError::InvalidEmail(_)
                | AuthError::InvalidName(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Otp(err) => match err {
                OtpError::InvalidEmail(_)
                | OtpError::InvalidPhone(_)
                | OtpError::NoPendingCode
                | OtpError::Rejected(_) => StatusCode::BAD_REQUEST,
                OtpError::ChannelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                OtpError::Email(_) | OtpError::Sms(_) => StatusCode::BAD_GATEWAY,
                OtpError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Settings(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Message safe to show the visitor.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Session(_) | Self::Storage(_) | Self::Internal(_) => {
                "Internal server error".to_owned()
            }
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Invalid email or password".to_owned(),
                AuthError::UserAlreadyExists => {
                    "An account with this email already exists".to_owned()
                }
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::InvalidEmail(_) => "Invalid email address".to_owned(),
                AuthError::InvalidName(msg) => (*msg).to_owned(),
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    "Authentication error".to_owned()
                }
            },
            Self::Otp(err) => match err {
                OtpError::Email(_) | OtpError::Sms(_) => {
                    "We could not deliver your code. Please try again.".to_owned()
                }
                OtpError::Repository(_) => "Internal server error".to_owned(),
                other => other.to_string(),
            },
            Self::Settings(err) => err.to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (self.status(), self.public_message()).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_owned()),
        message: Some(message.to_owned()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_owned(),
                serde_json::Value::String((*value).to_owned()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use mandir_core::verification::{OtpChannel, VerificationError};

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_owned())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Auth(AuthError::InvalidCredentials)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Auth(AuthError::UserAlreadyExists)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_owned())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_otp_errors_map_to_client_statuses() {
        assert_eq!(
            get_status(OtpError::Rejected(VerificationError::Expired).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(OtpError::ChannelUnavailable(OtpChannel::Phone).into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = AppError::Database(RepositoryError::DataCorruption("secret".to_owned()));
        assert_eq!(err.public_message(), "Internal server error");

        let err = AppError::Otp(OtpError::Rejected(VerificationError::Mismatch));
        assert_eq!(err.public_message(), "the code does not match");
    }
}
