//! Activation mail delivery.
//!
//! Verification sends one of two plain-text messages: a link to the activation
//! page, or a numeric activation code. Delivery is best effort; callers log
//! failures and carry on.

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, instrument};

const SIGNATURE: &str = "Regards,\r\nThe MFA Team\r\n";

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_activation_link(
        &self,
        recipient: &str,
        device_name: &str,
        validate_url: &str,
    ) -> Result<()>;

    async fn send_activation_code(
        &self,
        recipient: &str,
        device_name: &str,
        activation_code: i64,
    ) -> Result<()>;
}

/// Render an activation code as three zero-padded groups of four digits.
#[must_use]
pub fn format_activation_code(code: i64) -> String {
    let last = code % 10_000;
    let middle = code / 10_000 % 10_000;
    let first = code / (10_000 * 10_000);
    format!("{first:04}-{middle:04}-{last:04}")
}

#[must_use]
pub fn activation_link_body(validate_url: &str) -> String {
    format!(
        "Your identity is now ready to activate:\r\n\
         Click this activation link and follow the instructions:\r\n\
         {validate_url}\r\n\r\n{SIGNATURE}"
    )
}

#[must_use]
pub fn activation_code_body(activation_code: i64) -> String {
    format!(
        "Your Activation code is\r\n{}\r\n\r\n{SIGNATURE}",
        format_activation_code(activation_code)
    )
}

pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    pub user: String,
    pub password: SecretString,
    pub use_tls: bool,
    pub sender: String,
    pub subject: String,
}

impl std::fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("use_tls", &self.use_tls)
            .field("sender", &self.sender)
            .field("subject", &self.subject)
            .finish()
    }
}

/// SMTP delivery via lettre.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
    subject: String,
}

impl SmtpMailer {
    /// # Errors
    /// Returns an error if the sender address or the relay configuration is invalid.
    pub fn new(settings: &SmtpSettings) -> Result<Self> {
        let sender: Mailbox = settings
            .sender
            .parse()
            .with_context(|| format!("Invalid email sender: {}", settings.sender))?;

        let mut builder = if settings.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.server)
                .with_context(|| format!("Invalid SMTP relay: {}", settings.server))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.server)
        }
        .port(settings.port);

        // Authenticate only when a password is configured.
        if !settings.password.expose_secret().is_empty() {
            builder = builder.credentials(Credentials::new(
                settings.user.clone(),
                settings.password.expose_secret().to_string(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            sender,
            subject: settings.subject.clone(),
        })
    }

    fn message(&self, recipient: &str, body: String) -> Result<Message> {
        let to: Mailbox = recipient
            .parse()
            .with_context(|| format!("Invalid recipient address: {recipient}"))?;
        Message::builder()
            .from(self.sender.clone())
            .to(to)
            .subject(self.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .context("Failed to build activation email")
    }

    async fn deliver(&self, message: Message) -> Result<()> {
        self.transport
            .send(message)
            .await
            .context("Failed to send activation email")?;
        Ok(())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    #[instrument(skip(self, validate_url))]
    async fn send_activation_link(
        &self,
        recipient: &str,
        device_name: &str,
        validate_url: &str,
    ) -> Result<()> {
        let message = self.message(recipient, activation_link_body(validate_url))?;
        self.deliver(message).await
    }

    #[instrument(skip(self, activation_code))]
    async fn send_activation_code(
        &self,
        recipient: &str,
        device_name: &str,
        activation_code: i64,
    ) -> Result<()> {
        let message = self.message(recipient, activation_code_body(activation_code))?;
        self.deliver(message).await
    }
}

/// Logs activation mail instead of sending it; used when no SMTP server is configured.
#[derive(Clone, Debug)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_activation_link(
        &self,
        recipient: &str,
        device_name: &str,
        validate_url: &str,
    ) -> Result<()> {
        info!(
            to_email = %recipient,
            device = %device_name,
            validate_url = %validate_url,
            "activation link mail stub"
        );
        Ok(())
    }

    async fn send_activation_code(
        &self,
        recipient: &str,
        device_name: &str,
        activation_code: i64,
    ) -> Result<()> {
        info!(
            to_email = %recipient,
            device = %device_name,
            activation_code = %format_activation_code(activation_code),
            "activation code mail stub"
        );
        Ok(())
    }
}
