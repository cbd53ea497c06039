//! SMS delivery of verification codes.
//!
//! Talks to a REST gateway that accepts a form POST of `To`, `From` and
//! `Body` with HTTP basic auth.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

use mandir_core::PhoneNumber;
use mandir_core::verification::{CODE_TTL, OtpCode};

use crate::config::SmsConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur when sending SMS.
#[derive(Debug, Error)]
pub enum SmsError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway refused the message.
    #[error("gateway error: {status} - {message}")]
    Gateway { status: u16, message: String },
}

/// SMS gateway client.
#[derive(Clone)]
pub struct SmsClient {
    client: reqwest::Client,
    api_url: Url,
    account_id: String,
    api_key: SecretString,
    sender: String,
}

impl SmsClient {
    /// Create a new gateway client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &SmsConfig) -> Result<Self, SmsError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            account_id: config.account_id.clone(),
            api_key: config.api_key.clone(),
            sender: config.sender.clone(),
        })
    }

    /// Send a verification code.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the gateway rejects it.
    pub async fn send_verification_code(
        &self,
        to: &PhoneNumber,
        code: &OtpCode,
        site_name: &str,
    ) -> Result<(), SmsError> {
        let body = message_body(code, site_name);
        let form = [
            ("To", to.as_str()),
            ("From", self.sender.as_str()),
            ("Body", body.as_str()),
        ];

        let response = self
            .client
            .post(self.api_url.clone())
            .basic_auth(&self.account_id, Some(self.api_key.expose_secret()))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SmsError::Gateway {
                status: status.as_u16(),
                message,
            });
        }

        tracing::info!("sms sent");
        Ok(())
    }
}

fn message_body(code: &OtpCode, site_name: &str) -> String {
    format!(
        "{} is your {site_name} verification code. It expires in {} minutes.",
        code.as_str(),
        CODE_TTL.num_minutes()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_body() {
        let code = OtpCode::from_stored("123456".to_owned());
        assert_eq!(
            message_body(&code, "Mandir Bazaar"),
            "123456 is your Mandir Bazaar verification code. It expires in 10 minutes."
        );
    }
}
