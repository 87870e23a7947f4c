//! Console mailer for development
//!
//! Logs emails instead of sending them. Bodies are redacted unless full output
//! is enabled, since log pipelines may capture OTP codes and reset links.

use crate::error::Result;
use crate::traits::mailer::{Email, Mailer};
use async_trait::async_trait;

/// A mailer that logs emails instead of sending them
///
/// **FOR DEVELOPMENT USE ONLY.** By default only the envelope and body sizes
/// are logged. Use `with_full_output(true)` to log the bodies too.
#[derive(Debug, Clone)]
pub struct ConsoleMailer {
    prefix: String,
    show_full_content: bool,
}

impl ConsoleMailer {
    pub fn new() -> Self {
        Self::with_prefix("[EMAIL]")
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            show_full_content: false,
        }
    }

    /// Enable or disable full email content output (default: redacted)
    pub fn with_full_output(mut self, enabled: bool) -> Self {
        if enabled {
            tracing::warn!(
                "ConsoleMailer: full output enabled - email content will be visible in logs. \
                 Do not use in production!"
            );
        }
        self.show_full_content = enabled;
        self
    }

    fn render(&self, email: &Email) -> String {
        let mut out = String::new();
        let p = &self.prefix;
        out.push_str(&format!("{p} From:    {}\n", email.from));
        out.push_str(&format!("{p} To:      {} recipient(s)\n", email.to.len()));
        if email.reply_to.is_some() {
            out.push_str(&format!("{p} Reply-To: [set]\n"));
        }
        out.push_str(&format!("{p} Subject: {}\n", email.subject));

        for (label, body) in [("TEXT", &email.text), ("HTML", &email.html)] {
            let Some(body) = body else { continue };
            if self.show_full_content {
                out.push_str(&format!("{p} [{label}]\n"));
                for line in body.lines() {
                    out.push_str(&format!("{p} {line}\n"));
                }
            } else {
                out.push_str(&format!("{p} [{label}] {} bytes [REDACTED]\n", body.len()));
            }
        }
        out
    }
}

impl Default for ConsoleMailer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        email.validate()?;
        tracing::info!(subject = %email.subject, "Email (console transport)\n{}", self.render(email));
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> Email {
        Email::new("from@test.com", "to@test.com", "Your code")
            .html("<p>123456</p>")
    }

    #[tokio::test]
    async fn test_console_mailer_sends_without_error() {
        let mailer = ConsoleMailer::new();
        assert!(mailer.send(&email()).await.is_ok());
    }

    #[tokio::test]
    async fn test_console_mailer_validates_email() {
        let mailer = ConsoleMailer::new();
        let email = Email::new("from@test.com", "to@test.com", "Test Subject");
        assert!(mailer.send(&email).await.is_err());
    }

    #[test]
    fn test_body_is_redacted_by_default() {
        let rendered = ConsoleMailer::new().render(&email());
        assert!(rendered.contains("[HTML] 13 bytes [REDACTED]"));
        assert!(!rendered.contains("123456"));
    }

    #[test]
    fn test_full_output_shows_body() {
        let rendered = ConsoleMailer::with_prefix("[DEV]")
            .with_full_output(true)
            .render(&email());
        assert!(rendered.contains("[DEV] <p>123456</p>"));
    }
}
