//! Email delivery of verification codes.
//!
//! Uses SMTP via lettre, with askama plain-text and HTML bodies. Subject and
//! intro line come from site settings.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use mandir_core::Email;
use mandir_core::verification::{CODE_TTL, OtpCode};

use crate::config::EmailConfig;
use crate::models::SiteSettings;

#[derive(Template)]
#[template(path = "email/verification_code.html")]
struct VerificationCodeHtml<'a> {
    site_name: &'a str,
    intro: &'a str,
    code: &'a str,
    minutes: i64,
    primary: &'a str,
}

#[derive(Template)]
#[template(path = "email/verification_code.txt")]
struct VerificationCodeText<'a> {
    site_name: &'a str,
    intro: &'a str,
    code: &'a str,
    minutes: i64,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("template error: {0}")]
    Template(#[from] askama::Error),
}

/// SMTP mailer.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailService {
    /// Build the mailer from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_owned(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }

    /// Send a verification code.
    ///
    /// # Errors
    ///
    /// Returns error if the message cannot be rendered or delivered.
    pub async fn send_verification_code(
        &self,
        to: &Email,
        code: &OtpCode,
        settings: &SiteSettings,
    ) -> Result<(), EmailError> {
        let (text, html) = render_verification_code(code, settings)?;
        self.send_multipart(to.as_str(), &settings.otp_email_subject, &text, &html)
            .await
    }

    async fn send_multipart(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_owned()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_owned()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_owned()),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(subject = %subject, "email sent");
        Ok(())
    }
}

fn render_verification_code(
    code: &OtpCode,
    settings: &SiteSettings,
) -> Result<(String, String), askama::Error> {
    let minutes = CODE_TTL.num_minutes();
    let text = VerificationCodeText {
        site_name: &settings.site_name,
        intro: &settings.otp_email_intro,
        code: code.as_str(),
        minutes,
    }
    .render()?;
    let html = VerificationCodeHtml {
        site_name: &settings.site_name,
        intro: &settings.otp_email_intro,
        code: code.as_str(),
        minutes,
        primary: settings.primary(),
    }
    .render()?;
    Ok((text, html))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bodies_carry_code_and_intro() {
        let settings = SiteSettings {
            otp_email_intro: "Jai Shri Ram! Here is your code.".to_owned(),
            ..SiteSettings::default()
        };
        let code = OtpCode::from_stored("482913".to_owned());
        let (text, html) = render_verification_code(&code, &settings).unwrap();

        assert!(text.contains("482913"));
        assert!(text.contains("Jai Shri Ram! Here is your code."));
        assert!(text.contains("10 minutes"));
        assert!(html.contains("482913"));
        assert!(html.contains(settings.primary()));
    }
}
