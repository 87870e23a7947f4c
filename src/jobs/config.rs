//! Configuration for background job system

use crate::utils::{get_env_with_prefix, parse_env_with_prefix};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Job queue backend type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobBackend {
    /// In-memory queue (for development/testing)
    #[serde(alias = "memory")]
    InMemory,
    /// Redis-backed queue (for production)
    #[default]
    Redis,
}

/// Configuration for background jobs
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobsConfig {
    /// Job queue backend type
    #[serde(default)]
    pub backend: JobBackend,

    /// Redis connection URL (only used for Redis backend)
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Redis password, if not embedded in the URL
    #[serde(default)]
    pub redis_password: Option<String>,

    /// Prefix for every Redis key the queues use
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Simultaneous email deliveries
    #[serde(default = "default_email_concurrency")]
    pub email_concurrency: usize,

    /// Simultaneous notification writes
    #[serde(default = "default_interaction_concurrency")]
    pub interaction_concurrency: usize,

    /// How long an idle pool waits before polling the queue again
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Seconds a claimed Redis job stays leased without a heartbeat before it
    /// is considered stalled and handed to another worker
    #[serde(default = "default_lease_secs")]
    pub lease_secs: u64,

    /// Retained completed (and, separately, failed) jobs per Redis queue
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            backend: JobBackend::default(),
            redis_url: default_redis_url(),
            redis_password: None,
            key_prefix: default_key_prefix(),
            email_concurrency: default_email_concurrency(),
            interaction_concurrency: default_interaction_concurrency(),
            poll_interval_ms: default_poll_interval_ms(),
            lease_secs: default_lease_secs(),
            history_limit: default_history_limit(),
        }
    }
}

impl JobsConfig {
    /// Load jobs configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(backend) = get_env_with_prefix("JOBS_BACKEND") {
            config.backend = match backend.to_lowercase().as_str() {
                "memory" | "inmemory" | "in-memory" => JobBackend::InMemory,
                _ => JobBackend::Redis,
            };
        }

        if let Some(url) = get_env_with_prefix("REDIS_URL") {
            config.redis_url = url;
        }

        if let Some(password) = get_env_with_prefix("REDIS_PASSWORD").filter(|p| !p.is_empty()) {
            config.redis_password = Some(password);
        }

        if let Some(prefix) = get_env_with_prefix("JOBS_KEY_PREFIX") {
            config.key_prefix = prefix;
        }

        if let Some(c) = parse_env_with_prefix::<usize>("EMAIL_CONCURRENCY") {
            config.email_concurrency = c.max(1);
        }

        if let Some(c) = parse_env_with_prefix::<usize>("INTERACTION_CONCURRENCY") {
            config.interaction_concurrency = c.max(1);
        }

        if let Some(ms) = parse_env_with_prefix("JOBS_POLL_INTERVAL_MS") {
            config.poll_interval_ms = ms;
        }

        if let Some(secs) = parse_env_with_prefix::<u64>("JOBS_LEASE_SECS") {
            config.lease_secs = secs.max(1);
        }

        if let Some(limit) = parse_env_with_prefix::<usize>("JOBS_HISTORY_LIMIT") {
            config.history_limit = limit.max(1);
        }

        config
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn lease(&self) -> Duration {
        Duration::from_secs(self.lease_secs.max(1))
    }
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_key_prefix() -> String {
    "writespace".to_string()
}

fn default_email_concurrency() -> usize {
    5
}

fn default_interaction_concurrency() -> usize {
    10
}

fn default_poll_interval_ms() -> u64 {
    200
}

fn default_lease_secs() -> u64 {
    30
}

fn default_history_limit() -> usize {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = JobsConfig::default();
        assert_eq!(config.backend, JobBackend::Redis);
        assert_eq!(config.redis_url, "redis://localhost:6379");
        assert_eq!(config.email_concurrency, 5);
        assert_eq!(config.interaction_concurrency, 10);
        assert_eq!(config.poll_interval(), Duration::from_millis(200));
        assert_eq!(config.lease(), Duration::from_secs(30));
        assert_eq!(config.history_limit, 10_000);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: JobsConfig =
            serde_json::from_str(r#"{"backend": "memory", "email_concurrency": 2}"#).unwrap();
        assert_eq!(config.backend, JobBackend::InMemory);
        assert_eq!(config.email_concurrency, 2);
        assert_eq!(config.interaction_concurrency, 10);
        assert_eq!(config.key_prefix, "writespace");
        assert_eq!(config.lease_secs, 30);
    }

    #[test]
    fn test_zero_lease_is_clamped() {
        let config = JobsConfig {
            lease_secs: 0,
            ..JobsConfig::default()
        };
        assert_eq!(config.lease(), Duration::from_secs(1));
    }
}
