//! Transactional email for signup verification and store invitations.
//!
//! Uses SMTP via lettre for delivery with Askama HTML templates. Callers
//! treat delivery failures as non-fatal: the work that triggered the email
//! is already committed.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use barestore_core::Email;

use crate::config::EmailConfig;

#[derive(Template)]
#[template(path = "email/verification.html")]
struct VerificationEmailHtml<'a> {
    verify_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/verification.txt")]
struct VerificationEmailText<'a> {
    verify_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/invitation.html")]
struct InvitationEmailHtml<'a> {
    store_name: &'a str,
    invite_url: &'a str,
    invite_code: &'a str,
}

#[derive(Template)]
#[template(path = "email/invitation.txt")]
struct InvitationEmailText<'a> {
    store_name: &'a str,
    invite_url: &'a str,
    invite_code: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Outbound mail used by the auth and membership services.
#[allow(async_fn_in_trait)]
pub trait Mailer {
    /// Send the signup verification link carrying the raw token.
    async fn send_verification_email(&self, to: &Email, token: &str) -> Result<(), EmailError>;

    /// Send a store invitation carrying the store's invite code.
    async fn send_invitation_email(
        &self,
        to: &Email,
        store_name: &str,
        invite_code: &str,
    ) -> Result<(), EmailError>;
}

/// SMTP-backed [`Mailer`].
#[derive(Clone)]
pub struct SmtpMailer {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
    frontend_url: String,
}

impl SmtpMailer {
    /// Create a new mailer from configuration.
    ///
    /// `frontend_url` is the base for links placed in emails.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig, frontend_url: &str) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
            frontend_url: frontend_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
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
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

impl Mailer for SmtpMailer {
    async fn send_verification_email(&self, to: &Email, token: &str) -> Result<(), EmailError> {
        let verify_url = format!("{}/signup/verify?token={token}", self.frontend_url);
        let html = VerificationEmailHtml {
            verify_url: &verify_url,
        }
        .render()?;
        let text = VerificationEmailText {
            verify_url: &verify_url,
        }
        .render()?;

        self.send_multipart_email(to.as_str(), "Verify your Barestore account", &text, &html)
            .await
    }

    async fn send_invitation_email(
        &self,
        to: &Email,
        store_name: &str,
        invite_code: &str,
    ) -> Result<(), EmailError> {
        let invite_url = format!("{}/invitations?code={invite_code}", self.frontend_url);
        let html = InvitationEmailHtml {
            store_name,
            invite_url: &invite_url,
            invite_code,
        }
        .render()?;
        let text = InvitationEmailText {
            store_name,
            invite_url: &invite_url,
            invite_code,
        }
        .render()?;

        self.send_multipart_email(
            to.as_str(),
            &format!("You've been invited to {store_name} on Barestore"),
            &text,
            &html,
        )
        .await
    }
}

// =============================================================================
// Test Support
// =============================================================================

/// An email captured by [`RecordingMailer`].
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentEmail {
    Verification {
        to: Email,
        token: String,
    },
    Invitation {
        to: Email,
        store_name: String,
        invite_code: String,
    },
}

/// [`Mailer`] that records messages instead of sending them.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: tokio::sync::Mutex<Vec<SentEmail>>,
    fail: bool,
}

#[cfg(any(test, feature = "test-utils"))]
impl RecordingMailer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose every send fails.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            sent: tokio::sync::Mutex::default(),
            fail: true,
        }
    }

    pub async fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().await.clone()
    }

    /// Raw token from the most recent verification email to `to`.
    pub async fn last_verification_token(&self, to: &Email) -> Option<String> {
        self.sent.lock().await.iter().rev().find_map(|mail| match mail {
            SentEmail::Verification { to: addr, token } if addr == to => Some(token.clone()),
            _ => None,
        })
    }

    async fn record(&self, mail: SentEmail) -> Result<(), EmailError> {
        if self.fail {
            return Err(EmailError::InvalidAddress("recording mailer set to fail".into()));
        }
        self.sent.lock().await.push(mail);
        Ok(())
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Mailer for RecordingMailer {
    async fn send_verification_email(&self, to: &Email, token: &str) -> Result<(), EmailError> {
        self.record(SentEmail::Verification {
            to: to.clone(),
            token: token.to_owned(),
        })
        .await
    }

    async fn send_invitation_email(
        &self,
        to: &Email,
        store_name: &str,
        invite_code: &str,
    ) -> Result<(), EmailError> {
        self.record(SentEmail::Invitation {
            to: to.clone(),
            store_name: store_name.to_owned(),
            invite_code: invite_code.to_owned(),
        })
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_templates_include_link() {
        let url = "https://app.example.com/signup/verify?token=abc123";
        let html = VerificationEmailHtml { verify_url: url }.render().unwrap();
        let text = VerificationEmailText { verify_url: url }.render().unwrap();

        assert!(html.contains("token=abc123"));
        assert!(text.contains(url));
    }

    #[test]
    fn test_invitation_templates_include_code() {
        let text = InvitationEmailText {
            store_name: "Corner Shop",
            invite_url: "https://app.example.com/invitations?code=XYZ",
            invite_code: "XYZ",
        }
        .render()
        .unwrap();

        assert!(text.contains("Corner Shop"));
        assert!(text.contains("XYZ"));
    }

    #[tokio::test]
    async fn test_recording_mailer_captures_tokens() {
        let mailer = RecordingMailer::new();
        let to = Email::parse("a@example.com").unwrap();
        mailer.send_verification_email(&to, "one").await.unwrap();
        mailer.send_verification_email(&to, "two").await.unwrap();

        assert_eq!(mailer.last_verification_token(&to).await.as_deref(), Some("two"));
        assert_eq!(mailer.sent().await.len(), 2);
    }
}
