//! Contact verification route handlers (HTMX fragments).
//!
//! A refused send or confirm is rendered into the fragment so the form can
//! show it; provider and database failures still go through [`AppError`].

use askama::Template;
use askama_web::WebTemplate;
use axum::{Form, extract::State, response::IntoResponse};
use serde::Deserialize;
use tracing::instrument;

use mandir_core::verification::OtpChannel;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{AnyRole, RequireRole};
use crate::services::otp::{Destination, OtpError};
use crate::state::AppState;

/// Send-code form data.
#[derive(Debug, Deserialize)]
pub struct SendCodeForm {
    pub channel: OtpChannel,
    pub destination: String,
}

/// Confirm-code form data.
#[derive(Debug, Deserialize)]
pub struct ConfirmCodeForm {
    pub channel: OtpChannel,
    pub code: String,
}

/// Where a verification form stands after a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyState {
    /// Nothing sent yet, or the send was refused.
    Idle,
    /// A code is on its way; show the code input.
    AwaitingCode,
    /// The contact is verified.
    Verified,
}

/// Verification status fragment.
#[derive(Template, WebTemplate)]
#[template(path = "partials/verify_status.html")]
pub struct VerifyStatusTemplate {
    pub channel: OtpChannel,
    pub state: VerifyState,
    pub destination: String,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl VerifyStatusTemplate {
    #[must_use]
    pub const fn awaiting_code(&self) -> bool {
        matches!(self.state, VerifyState::AwaitingCode)
    }

    #[must_use]
    pub const fn verified(&self) -> bool {
        matches!(self.state, VerifyState::Verified)
    }
}

/// Split client-side refusals from failures the visitor cannot fix.
///
/// Delivery failures are reported to Sentry but still shown in the form so
/// the visitor can retry.
fn refusal(err: OtpError) -> Result<String> {
    match err {
        OtpError::Repository(_) => Err(err.into()),
        OtpError::Email(_) | OtpError::Sms(_) => {
            let event_id = sentry::capture_error(&err);
            tracing::error!(error = %err, sentry_event_id = %event_id, "code delivery failed");
            Ok(AppError::from(err).public_message())
        }
        other => Ok(AppError::from(other).public_message()),
    }
}

/// Send a verification code.
#[instrument(skip(state, guard, form), fields(user_id = %guard.user_id(), channel = %form.channel))]
pub async fn send(
    State(state): State<AppState>,
    guard: RequireRole<AnyRole>,
    Form(form): Form<SendCodeForm>,
) -> Result<impl IntoResponse> {
    let mut view = VerifyStatusTemplate {
        channel: form.channel,
        state: VerifyState::Idle,
        destination: form.destination.trim().to_owned(),
        message: None,
        error: None,
    };

    let settings = state.settings().current().await;
    let result = match Destination::parse(form.channel, &form.destination) {
        Ok(destination) => {
            view.destination = destination.as_str().to_owned();
            state
                .otp()
                .send(guard.user_id(), &destination, &settings)
                .await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {
            add_breadcrumb("verify", "code sent", Some(&[("channel", form.channel.as_str())]));
            view.state = VerifyState::AwaitingCode;
            view.message = Some(format!("We sent a code to {}.", view.destination));
        }
        Err(e) => view.error = Some(refusal(e)?),
    }

    Ok(view)
}

/// Confirm a verification code.
#[instrument(skip(state, guard, form), fields(user_id = %guard.user_id(), channel = %form.channel))]
pub async fn confirm(
    State(state): State<AppState>,
    guard: RequireRole<AnyRole>,
    Form(form): Form<ConfirmCodeForm>,
) -> Result<impl IntoResponse> {
    let mut view = VerifyStatusTemplate {
        channel: form.channel,
        state: VerifyState::AwaitingCode,
        destination: String::new(),
        message: None,
        error: None,
    };

    match state
        .otp()
        .verify(guard.user_id(), form.channel, &form.code)
        .await
    {
        Ok(()) => {
            view.state = VerifyState::Verified;
            view.message = Some(format!("Your {} is verified.", channel_noun(form.channel)));
        }
        Err(OtpError::NoPendingCode) => {
            view.state = VerifyState::Idle;
            view.error = Some(OtpError::NoPendingCode.to_string());
        }
        Err(e) => view.error = Some(refusal(e)?),
    }

    Ok(view)
}

const fn channel_noun(channel: OtpChannel) -> &'static str {
    match channel {
        OtpChannel::Email => "email address",
        OtpChannel::Phone => "phone number",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mandir_core::verification::VerificationError;

    use super::*;

    #[test]
    fn test_rejected_code_is_shown_to_visitor() {
        let message = refusal(OtpError::Rejected(VerificationError::Expired)).unwrap();
        assert_eq!(message, "this code has expired, request a new one");
    }

    #[test]
    fn test_storage_failure_is_not_shown() {
        let result = refusal(OtpError::Repository(crate::db::RepositoryError::NotFound));
        assert!(result.is_err());
    }

    #[test]
    fn test_awaiting_fragment_has_code_input() {
        let view = VerifyStatusTemplate {
            channel: OtpChannel::Phone,
            state: VerifyState::AwaitingCode,
            destination: "+919876543210".to_owned(),
            message: Some("We sent a code to +919876543210.".to_owned()),
            error: None,
        };
        let html = view.render().unwrap();
        assert!(html.contains("name=\"code\""));
        assert!(html.contains("value=\"phone\""));
    }
}
