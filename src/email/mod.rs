//! Mail transports
//!
//! - `ConsoleMailer` - Logs emails instead of sending them (for development)
//! - `SmtpMailer` - Sends emails via SMTP using lettre (feature `email`)
//!
//! # Example
//!
//! ```rust,ignore
//! use writespace_jobs::email::{Email, SmtpMailer, SmtpConfig};
//! use writespace_jobs::traits::mailer::Mailer;
//!
//! let config = SmtpConfig::new("smtp.example.com")
//!     .credentials("user", "password")
//!     .from("Writespace <noreply@example.com>");
//! let mailer = SmtpMailer::new(config)?;
//!
//! let email = Email::new("noreply@example.com", "user@example.com", "Welcome!")
//!     .html("<h1>Thanks for signing up!</h1>");
//!
//! mailer.send(&email).await?;
//! ```

mod config;
mod console;
#[cfg(feature = "email")]
mod smtp;

pub use config::{EmailConfig, SmtpConfig};
pub use console::ConsoleMailer;
#[cfg(feature = "email")]
pub use smtp::SmtpMailer;

// Re-export Email from traits for convenience
pub use crate::traits::mailer::Email;
