use crate::utils::parse_env_with_prefix;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShutdownConfig {
    /// Upper bound for each shutdown step in seconds (0 = wait indefinitely)
    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            step_timeout_secs: default_step_timeout_secs(),
        }
    }
}

impl ShutdownConfig {
    /// Load from `SHUTDOWN_STEP_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(secs) = parse_env_with_prefix("SHUTDOWN_STEP_TIMEOUT_SECS") {
            config.step_timeout_secs = secs;
        }
        config
    }

    pub fn step_timeout(&self) -> Option<Duration> {
        (self.step_timeout_secs > 0).then(|| Duration::from_secs(self.step_timeout_secs))
    }
}

fn default_step_timeout_secs() -> u64 {
    30
}
