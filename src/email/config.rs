//! Email delivery configuration

use crate::error::{JobsError, Result};
use crate::utils::{get_env_with_prefix, parse_env_with_prefix};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// SMTP connection settings
#[derive(Clone, Deserialize, Serialize)]
pub struct SmtpConfig {
    pub host: String,
    /// SMTP server port (default: 587 for STARTTLS, 465 means implicit TLS)
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    /// Use STARTTLS on ports other than 465 (default: true)
    #[serde(default = "default_true")]
    pub starttls: bool,
}

impl SmtpConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_smtp_port(),
            username: None,
            password: None,
            starttls: true,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Disable STARTTLS (plain connection, e.g. a local relay)
    pub fn no_starttls(mut self) -> Self {
        self.starttls = false;
        self
    }

    /// Whether the connection is TLS from the first byte (SMTPS)
    pub fn implicit_tls(&self) -> bool {
        self.port == 465
    }

    /// Create config from environment variables
    ///
    /// Reads `SMTP_HOST` (required), `SMTP_PORT`, `SMTP_USERNAME` (or `SMTP_USER`),
    /// `SMTP_PASSWORD` (or `SMTP_PASS`) and `SMTP_STARTTLS`, each optionally
    /// prefixed with `WRITESPACE_`.
    pub fn from_env() -> Result<Self> {
        let host = get_env_with_prefix("SMTP_HOST")
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| JobsError::validation("SMTP_HOST environment variable not set"))?;

        let username = get_env_with_prefix("SMTP_USERNAME").or_else(|| get_env_with_prefix("SMTP_USER"));
        let password = get_env_with_prefix("SMTP_PASSWORD").or_else(|| get_env_with_prefix("SMTP_PASS"));
        let starttls = get_env_with_prefix("SMTP_STARTTLS")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        Ok(Self {
            host,
            port: parse_env_with_prefix("SMTP_PORT").unwrap_or_else(default_smtp_port),
            username,
            password,
            starttls,
        })
    }
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("starttls", &self.starttls)
            .finish()
    }
}

/// Settings for the email delivery worker
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmailConfig {
    /// Sender mailbox used for every outgoing email
    #[serde(default = "default_from")]
    pub from: String,

    /// OTP emails older than this when claimed are skipped
    #[serde(default = "default_otp_stale_after_secs")]
    pub otp_stale_after_secs: u64,

    /// SMTP transport; `None` logs emails to the console instead
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            from: default_from(),
            otp_stale_after_secs: default_otp_stale_after_secs(),
            smtp: None,
        }
    }
}

impl EmailConfig {
    /// Load email configuration from environment variables
    ///
    /// The sender comes from `SMTP_FROM`, falling back to the SMTP username.
    /// SMTP is only configured when `SMTP_HOST` is set.
    pub fn from_env() -> Self {
        let mut config = Self {
            smtp: SmtpConfig::from_env().ok(),
            ..Self::default()
        };

        if let Some(from) = get_env_with_prefix("SMTP_FROM").filter(|f| !f.trim().is_empty()) {
            config.from = from;
        } else if let Some(user) = config.smtp.as_ref().and_then(|s| s.username.as_deref()) {
            if user.contains('@') {
                config.from = format!("WriteSpace <{}>", user);
            }
        }

        if let Some(secs) = parse_env_with_prefix("EMAIL_OTP_STALE_AFTER_SECS") {
            config.otp_stale_after_secs = secs;
        }

        config
    }

    pub fn otp_stale_after(&self) -> Duration {
        Duration::from_secs(self.otp_stale_after_secs)
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_true() -> bool {
    true
}

fn default_from() -> String {
    "WriteSpace <no-reply@writespace.app>".to_string()
}

fn default_otp_stale_after_secs() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_defaults() {
        let config = EmailConfig::default();
        assert_eq!(config.otp_stale_after(), Duration::from_secs(60));
        assert!(config.smtp.is_none());
    }

    #[test]
    fn test_implicit_tls_on_465() {
        assert!(SmtpConfig::new("smtp.example.com").port(465).implicit_tls());
        assert!(!SmtpConfig::new("smtp.example.com").implicit_tls());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = SmtpConfig::new("smtp.example.com").credentials("user", "hunter2");
        let debug = format!("{:?}", config);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: EmailConfig =
            serde_json::from_str(r#"{"smtp": {"host": "mail.local"}}"#).unwrap();
        let smtp = config.smtp.unwrap();
        assert_eq!(smtp.port, 587);
        assert!(smtp.starttls);
        assert_eq!(config.otp_stale_after_secs, 60);
    }
}
