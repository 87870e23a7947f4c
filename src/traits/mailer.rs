//! Mailer trait for sending emails
//!
//! Abstracts the mail transport so the email worker can deliver through SMTP
//! in production and through the console (or a recording fake) elsewhere.

use crate::error::{JobsError, Result};
use async_trait::async_trait;

/// An email message to be sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    /// Sender mailbox, e.g. `"Writespace <noreply@example.com>"`
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    /// Plain text body (optional if html is provided)
    pub text: Option<String>,
    /// HTML body (optional if text is provided)
    pub html: Option<String>,
    pub reply_to: Option<String>,
}

impl Email {
    pub fn new(from: impl Into<String>, to: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: vec![to.into()],
            subject: subject.into(),
            text: None,
            html: None,
            reply_to: None,
        }
    }

    /// Add a recipient
    pub fn to(mut self, recipient: impl Into<String>) -> Self {
        self.to.push(recipient.into());
        self
    }

    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.text = Some(body.into());
        self
    }

    pub fn html(mut self, body: impl Into<String>) -> Self {
        self.html = Some(body.into());
        self
    }

    pub fn reply_to(mut self, address: impl Into<String>) -> Self {
        self.reply_to = Some(address.into());
        self
    }

    /// Check the message has a sender, a recipient, a subject and a body
    pub fn validate(&self) -> Result<()> {
        if self.from.trim().is_empty() {
            return Err(JobsError::validation("Email 'from' is required"));
        }
        if self.to.is_empty() || self.to.iter().any(|to| to.trim().is_empty()) {
            return Err(JobsError::validation("Email 'to' is required"));
        }
        if self.subject.trim().is_empty() {
            return Err(JobsError::validation("Email 'subject' is required"));
        }
        if self.text.is_none() && self.html.is_none() {
            return Err(JobsError::validation(
                "Email must have either 'text' or 'html' body",
            ));
        }
        Ok(())
    }
}

/// Mail transport used by the email worker
///
/// `send` returning an error counts as a failed delivery attempt and is retried
/// according to the job's options.
///
/// # Example
///
/// ```rust,ignore
/// struct RecordingMailer(Mutex<Vec<Email>>);
///
/// #[async_trait]
/// impl Mailer for RecordingMailer {
///     async fn send(&self, email: &Email) -> Result<()> {
///         self.0.lock().unwrap().push(email.clone());
///         Ok(())
///     }
///
///     fn is_healthy(&self) -> bool {
///         true
///     }
/// }
/// ```
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<()>;

    /// Check if the mailer backend is healthy/connected
    fn is_healthy(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_requires_body() {
        let email = Email::new("from@example.com", "to@example.com", "Hi");
        assert!(matches!(email.validate(), Err(JobsError::Validation(_))));
        assert!(email.html("<p>Hi</p>").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_recipient() {
        let email = Email::new("from@example.com", " ", "Hi").text("Hi");
        assert!(email.validate().is_err());
    }

    #[test]
    fn test_multiple_recipients() {
        let email = Email::new("from@example.com", "a@example.com", "Hi")
            .to("b@example.com")
            .text("Hi");
        assert_eq!(email.to.len(), 2);
        assert!(email.validate().is_ok());
    }
}
