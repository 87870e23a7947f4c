//! Per-job retry and retention policy

use crate::error::{JobsError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delay strategy between retry attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// Same delay before every retry
    Fixed,
    /// Delay doubles after every failed attempt
    Exponential,
}

/// Backoff policy: a kind and a base delay in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backoff {
    pub kind: BackoffKind,
    pub base_delay_ms: u64,
}

impl Backoff {
    pub fn fixed(base_delay_ms: u64) -> Self {
        Self {
            kind: BackoffKind::Fixed,
            base_delay_ms,
        }
    }

    pub fn exponential(base_delay_ms: u64) -> Self {
        Self {
            kind: BackoffKind::Exponential,
            base_delay_ms,
        }
    }

    /// Delay before retrying after `attempt` (1-based) failed
    ///
    /// Fixed: `base`. Exponential: `base * 2^(attempt - 1)`, saturating.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let millis = match self.kind {
            BackoffKind::Fixed => self.base_delay_ms,
            BackoffKind::Exponential => {
                let exponent = attempt.saturating_sub(1).min(63);
                self.base_delay_ms.saturating_mul(1_u64 << exponent)
            }
        };
        Duration::from_millis(millis)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::exponential(1000)
    }
}

/// Retry and retention options supplied at enqueue time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOptions {
    /// Total attempts allowed, including the first (at least 1)
    pub max_attempts: u32,
    pub backoff: Backoff,
    /// Drop the job from the store once it completes
    pub remove_on_complete: bool,
    /// Drop the job from the store once it fails for good
    pub remove_on_fail: bool,
}

impl JobOptions {
    /// Options with the given attempts and backoff, keeping nothing on completion
    /// and retaining failures for inspection
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            remove_on_complete: true,
            remove_on_fail: false,
        }
    }

    pub fn remove_on_complete(mut self, remove: bool) -> Self {
        self.remove_on_complete = remove;
        self
    }

    pub fn remove_on_fail(mut self, remove: bool) -> Self {
        self.remove_on_fail = remove;
        self
    }

    /// Reject options a queue cannot honour, such as a zero attempt budget set
    /// through the public fields
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(JobsError::validation("max_attempts must be at least 1"));
        }
        Ok(())
    }
}

impl Default for JobOptions {
    fn default() -> Self {
        Self::new(3, Backoff::default())
    }
}

/// The instant a job delayed by `delay` at `now` becomes visible, clamped to the max date
pub(crate) fn visible_after(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|delay| now.checked_add_signed(delay))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_backoff_is_constant() {
        let backoff = Backoff::fixed(1000);
        for attempt in 1..=5 {
            assert_eq!(backoff.delay_for(attempt), Duration::from_millis(1000));
        }
    }

    #[test]
    fn test_exponential_backoff_doubles() {
        let backoff = Backoff::exponential(1000);
        assert_eq!(backoff.delay_for(1), Duration::from_millis(1000));
        assert_eq!(backoff.delay_for(2), Duration::from_millis(2000));
        assert_eq!(backoff.delay_for(3), Duration::from_millis(4000));
        assert_eq!(backoff.delay_for(4), Duration::from_millis(8000));
    }

    #[test]
    fn test_exponential_backoff_saturates() {
        let backoff = Backoff::exponential(u64::MAX / 2);
        assert_eq!(backoff.delay_for(200), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn test_visible_after_clamps() {
        let now = Utc::now();
        assert_eq!(visible_after(now, Duration::from_millis(1500)), now + chrono::Duration::milliseconds(1500));
        assert_eq!(visible_after(now, Duration::MAX), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_max_attempts_is_at_least_one() {
        assert_eq!(JobOptions::new(0, Backoff::fixed(1)).max_attempts, 1);
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let options = JobOptions {
            max_attempts: 0,
            ..JobOptions::default()
        };
        assert!(matches!(options.validate(), Err(JobsError::Validation(_))));
        assert!(JobOptions::default().validate().is_ok());
    }

    #[test]
    fn test_default_options() {
        let options = JobOptions::default();
        assert_eq!(options.max_attempts, 3);
        assert_eq!(options.backoff, Backoff::exponential(1000));
        assert!(options.remove_on_complete);
        assert!(!options.remove_on_fail);
    }
}
