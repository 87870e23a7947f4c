use serde::{Deserialize, Serialize};

use crate::email::EmailConfig;
use crate::error::{JobsError, Result};
use crate::jobs::{JobBackend, JobsConfig};
use crate::notifications::NotificationsConfig;
use crate::shutdown::ShutdownConfig;
use crate::utils::get_env_with_prefix;

#[cfg(feature = "database")]
use crate::database::DatabaseConfig;

/// Main configuration for the job workers
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub email: EmailConfig,
    /// Postgres for the notification store; `None` keeps notifications in memory
    #[cfg(feature = "database")]
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_json")]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_json(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_json() -> bool {
    false
}

/// Builder for Config with environment variable support
#[must_use = "builder does nothing until you call build()"]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn with_json_logging(mut self, enabled: bool) -> Self {
        self.config.logging.json = enabled;
        self
    }

    pub fn with_jobs_config(mut self, jobs: JobsConfig) -> Self {
        self.config.jobs = jobs;
        self
    }

    pub fn with_email_config(mut self, email: EmailConfig) -> Self {
        self.config.email = email;
        self
    }

    #[cfg(feature = "database")]
    pub fn with_database(mut self, database: DatabaseConfig) -> Self {
        self.config.database = Some(database);
        self
    }

    pub fn with_shutdown_config(mut self, shutdown: ShutdownConfig) -> Self {
        self.config.shutdown = shutdown;
        self
    }

    pub fn with_notifications_config(mut self, notifications: NotificationsConfig) -> Self {
        self.config.notifications = notifications;
        self
    }

    /// Load configuration from environment variables with WRITESPACE_ prefix
    pub fn from_env(mut self) -> Self {
        if let Some(level) = get_env_with_prefix("LOG_LEVEL") {
            self.config.logging.level = level;
        }
        if let Some(json) = get_env_with_prefix("LOG_JSON") {
            self.config.logging.json = json.parse().unwrap_or(false);
        }

        self.config.jobs = JobsConfig::from_env();
        self.config.email = EmailConfig::from_env();
        self.config.shutdown = ShutdownConfig::from_env();
        self.config.notifications = NotificationsConfig::from_env();

        #[cfg(feature = "database")]
        {
            self.config.database = DatabaseConfig::from_env();
        }

        self
    }

    /// Build the configuration, validating all settings
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unknown log level, a zero worker
    /// concurrency, or a Redis backend without a URL.
    pub fn build(self) -> Result<Config> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.config.logging.level.to_lowercase().as_str()) {
            return Err(JobsError::validation(format!(
                "Invalid log level: {}. Must be one of: {}",
                self.config.logging.level,
                valid_log_levels.join(", ")
            )));
        }

        if self.config.jobs.email_concurrency == 0 || self.config.jobs.interaction_concurrency == 0 {
            return Err(JobsError::validation(
                "Worker concurrency must be greater than 0",
            ));
        }

        if self.config.jobs.backend == JobBackend::Redis && self.config.jobs.redis_url.trim().is_empty() {
            return Err(JobsError::validation(
                "REDIS_URL is required for the redis job backend",
            ));
        }

        if self.config.email.from.trim().is_empty() {
            return Err(JobsError::validation("Email sender address is required"));
        }

        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_builds() {
        let config = ConfigBuilder::new().build().unwrap();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.jobs.email_concurrency, 5);
        assert_eq!(config.shutdown.step_timeout_secs, 30);
    }

    #[test]
    fn test_rejects_invalid_log_level() {
        let result = ConfigBuilder::new().with_log_level("loud").build();
        assert!(matches!(result, Err(JobsError::Validation(_))));
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let jobs = JobsConfig {
            email_concurrency: 0,
            ..JobsConfig::default()
        };
        assert!(ConfigBuilder::new().with_jobs_config(jobs).build().is_err());
    }

    #[test]
    fn test_deserialize_sections() {
        let config: Config = serde_json::from_str(
            r#"{"jobs": {"backend": "memory"}, "notifications": {"client_url": "https://writespace.app"}}"#,
        )
        .unwrap();
        assert_eq!(config.jobs.backend, JobBackend::InMemory);
        assert_eq!(config.notifications.client_url, "https://writespace.app");
        assert_eq!(config.notifications.app_name, "Writespace");
    }
}
