//! SMTP mailer using lettre

use crate::email::SmtpConfig;
use crate::error::{JobsError, Result};
use crate::traits::mailer::{Email, Mailer};
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::authentication::Credentials,
};

/// SMTP mailer using lettre
///
/// The transport keeps a connection pool, so one mailer is shared by every
/// task of the email worker pool.
///
/// # Example
///
/// ```rust,ignore
/// let config = SmtpConfig::new("smtp.gmail.com")
///     .port(465)
///     .credentials("user@gmail.com", "app-password");
///
/// let mailer = SmtpMailer::new(config)?;
/// ```
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Result<Self> {
        let builder = if config.implicit_tls() {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        } else {
            Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host))
        }
        .map_err(|e| JobsError::transport(format!("Failed to create SMTP transport: {}", e)))?;

        let mut builder = builder.port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        tracing::info!(host = %config.host, port = config.port, "SMTP transport configured");

        Ok(Self {
            transport: builder.build(),
            config,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(SmtpConfig::from_env()?)
    }

    fn build_message(email: &Email) -> Result<Message> {
        let from: Mailbox = email
            .from
            .parse()
            .map_err(|e| JobsError::validation(format!("Invalid 'from' address: {}", e)))?;

        let mut builder = Message::builder().from(from).subject(&email.subject);

        for to in &email.to {
            let mailbox: Mailbox = to.parse().map_err(|e| {
                JobsError::validation(format!("Invalid 'to' address '{}': {}", to, e))
            })?;
            builder = builder.to(mailbox);
        }

        if let Some(ref reply_to) = email.reply_to {
            let mailbox: Mailbox = reply_to
                .parse()
                .map_err(|e| JobsError::validation(format!("Invalid 'reply_to' address: {}", e)))?;
            builder = builder.reply_to(mailbox);
        }

        let message = match (&email.text, &email.html) {
            (Some(text), Some(html)) => builder.multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html.clone()),
                    ),
            ),
            (Some(text), None) => builder.header(ContentType::TEXT_PLAIN).body(text.clone()),
            (None, Some(html)) => builder.header(ContentType::TEXT_HTML).body(html.clone()),
            (None, None) => {
                return Err(JobsError::validation(
                    "Email must have either text or HTML body",
                ));
            }
        };

        message.map_err(|e| JobsError::internal(format!("Failed to build email: {}", e)))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        email.validate()?;
        let message = Self::build_message(email)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| JobsError::transport(format!("Failed to send email: {}", e)))?;

        Ok(())
    }

    fn is_healthy(&self) -> bool {
        // Connections are opened per send from the pool; there is no standing state to check
        true
    }
}

// AsyncSmtpTransport doesn't impl Debug
impl std::fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .finish()
    }
}
