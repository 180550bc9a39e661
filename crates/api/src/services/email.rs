//! Email service for password reset messages.
//!
//! Uses SMTP via lettre, sending a plain text and an HTML alternative
//! rendered from Askama templates.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart, SinglePart},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::EmailConfig;

#[derive(Template)]
#[template(path = "email/password_reset.html")]
struct PasswordResetEmailHtml<'a> {
    username: &'a str,
    reset_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_reset.txt")]
struct PasswordResetEmailText<'a> {
    username: &'a str,
    reset_url: &'a str,
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

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
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
        })
    }

    /// Send a password reset link.
    ///
    /// # Errors
    ///
    /// Returns error if the message cannot be built or delivered.
    pub async fn send_password_reset(
        &self,
        to: &str,
        username: &str,
        reset_url: &str,
    ) -> Result<(), EmailError> {
        let (text, html) = password_reset_bodies(username, reset_url)?;
        let message = build_message(
            &self.from_address,
            to,
            "Reset your Cartwheel password",
            text,
            html,
        )?;

        self.mailer.send(message).await?;
        tracing::info!(to = %to, "Password reset email sent");
        Ok(())
    }
}

/// Assemble a `multipart/alternative` message with text and HTML parts.
fn build_message(
    from: &str,
    to: &str,
    subject: &str,
    text: String,
    html: String,
) -> Result<Message, EmailError> {
    let from: Mailbox = from
        .parse()
        .map_err(|_| EmailError::InvalidAddress(from.to_owned()))?;
    let to: Mailbox = to
        .parse()
        .map_err(|_| EmailError::InvalidAddress(to.to_owned()))?;

    let body = MultiPart::alternative()
        .singlepart(SinglePart::plain(text))
        .singlepart(SinglePart::html(html));

    Ok(Message::builder()
        .from(from)
        .to(to)
        .subject(subject)
        .multipart(body)?)
}

/// Plain text and HTML bodies for a reset message.
fn password_reset_bodies(username: &str, reset_url: &str) -> Result<(String, String), EmailError> {
    let text = PasswordResetEmailText { username, reset_url }.render()?;
    let html = PasswordResetEmailHtml { username, reset_url }.render()?;
    Ok((text, html))
}
