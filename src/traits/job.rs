//! Background job system traits
//!
//! This module defines the job record stored in queues and the traits that
//! queue backends and typed job payloads implement.

use crate::error::{JobsError, Result};
use crate::jobs::JobOptions;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::time::Duration;

/// The kinds of job this system knows how to run
///
/// Each kind is bound to exactly one queue and one handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    /// Deliver a transactional email
    SendEmail,
    /// Persist an in-app notification
    ProcessInteraction,
}

impl JobKind {
    /// Job type discriminator stored with each job
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SendEmail => "send-email",
            Self::ProcessInteraction => "process-interaction",
        }
    }

    /// Name of the queue jobs of this kind are enqueued on
    pub fn queue_name(&self) -> &'static str {
        match self {
            Self::SendEmail => "email-queue",
            Self::ProcessInteraction => "interaction-queue",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Waiting to be claimed (possibly delayed until `available_at`)
    Pending,
    /// Claimed by a worker and executing
    Active,
    /// Terminal: handler succeeded
    Completed,
    /// Terminal: handler failed on the last allowed attempt
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// A typed job payload that can be enqueued
///
/// Payload types implement this to declare which kind of job they are and the
/// retry policy producers use by default.
pub trait Job: Send + Sync + Debug {
    /// The job kind (and therefore queue) this payload belongs to
    fn kind(&self) -> JobKind;

    /// Serialize the job payload to JSON
    fn serialize(&self) -> Result<serde_json::Value>;

    /// Retry and retention policy used when no explicit options are given
    fn default_options(&self) -> JobOptions {
        JobOptions::default()
    }
}

/// Job data structure for queue storage
///
/// This represents a job that has been enqueued, including
/// metadata like attempt count and scheduling information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobData {
    /// Unique job identifier
    pub job_id: String,
    /// Queue this job belongs to
    pub queue: String,
    /// Job type identifier (matches `JobKind::as_str()`)
    pub job_type: String,
    /// Serialized job payload (JSON)
    pub payload: serde_json::Value,
    /// Number of attempts started so far
    pub attempts_made: u32,
    /// Retry and retention policy
    pub options: JobOptions,
    /// Current lifecycle state
    pub state: JobState,
    /// Timestamp when job was enqueued
    pub created_at: DateTime<Utc>,
    /// When a delayed retry becomes visible again (None = immediately)
    #[serde(default)]
    pub available_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    /// Error message from the most recent failed attempt
    #[serde(default)]
    pub last_error: Option<String>,
}

impl JobData {
    /// Create a new pending job with a fresh id
    pub fn new(
        queue: impl Into<String>,
        job_type: impl Into<String>,
        payload: serde_json::Value,
        options: JobOptions,
    ) -> Self {
        Self {
            job_id: uuid::Uuid::new_v4().to_string(),
            queue: queue.into(),
            job_type: job_type.into(),
            payload,
            attempts_made: 0,
            options,
            state: JobState::Pending,
            created_at: Utc::now(),
            available_at: None,
            finished_at: None,
            last_error: None,
        }
    }

    /// Build job data from a typed payload using the kind's queue and type name
    pub fn from_job(job: &dyn Job, options: JobOptions) -> Result<Self> {
        let kind = job.kind();
        Ok(Self::new(kind.queue_name(), kind.as_str(), job.serialize()?, options))
    }

    /// The attempt currently running (1-based once claimed)
    pub fn attempt(&self) -> u32 {
        self.attempts_made
    }

    /// Check if this job may be attempted again after a failure
    pub fn should_retry(&self) -> bool {
        self.attempts_made < self.options.max_attempts
    }

    /// Mark the job as claimed, returning the new attempt number
    ///
    /// Fails if the job already used up all of its attempts.
    pub fn begin_attempt(&mut self) -> Result<u32> {
        if self.attempts_made >= self.options.max_attempts {
            return Err(JobsError::internal(format!(
                "Job {} has no attempts left ({} of {})",
                self.job_id, self.attempts_made, self.options.max_attempts
            )));
        }
        self.attempts_made += 1;
        self.state = JobState::Active;
        self.available_at = None;
        Ok(self.attempts_made)
    }

    /// Time elapsed since the job was enqueued
    pub fn age(&self) -> Duration {
        (Utc::now() - self.created_at).to_std().unwrap_or(Duration::ZERO)
    }

    /// Whether a delayed job is visible at `now`
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.available_at.is_none_or(|at| at <= now)
    }
}

/// Reference to an enqueued job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub id: String,
    pub queue: String,
}

/// What the queue did with a job after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// The job was rescheduled and becomes visible after `delay`
    Retrying { attempt: u32, delay: Duration },
    /// Attempts are exhausted; the job is now failed
    Failed { attempts: u32 },
}

impl FailOutcome {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Number of jobs per state in a queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounts {
    pub pending: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Job queue trait for enqueueing and claiming background jobs
///
/// One instance serves one named queue. Implementations provide different
/// backends (in-memory, Redis) but share the same claim/complete/fail protocol.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Name of the queue this instance serves
    fn name(&self) -> &str;

    /// Durably record a job and make it available for claiming
    ///
    /// Returns only after the store acknowledged the write.
    async fn enqueue(&self, job: JobData) -> Result<JobHandle>;

    /// Atomically claim the oldest ready job
    ///
    /// Due delayed jobs are promoted first. The claimed job is moved to the
    /// active state and its attempt count is incremented. Returns `None` if no
    /// job is ready.
    async fn claim(&self) -> Result<Option<JobData>>;

    /// Mark an active job as completed
    ///
    /// The job is discarded or retained according to `remove_on_complete`.
    async fn complete(&self, job_id: &str) -> Result<()>;

    /// Record a failed attempt of an active job
    ///
    /// Reschedules the job with backoff if attempts remain, otherwise moves it
    /// to the failed state (retained or discarded according to `remove_on_fail`).
    async fn fail(&self, job_id: &str, error: &str) -> Result<FailOutcome>;

    /// Look up a job that is still held by the queue
    async fn get(&self, job_id: &str) -> Result<Option<JobData>>;

    /// Count jobs per state
    async fn counts(&self) -> Result<JobCounts>;

    /// Release the store connection; further operations fail
    async fn close(&self) -> Result<()>;

    /// Check if the queue is healthy and operational
    fn is_healthy(&self) -> bool;

    /// How long a claim stays valid without renewal
    ///
    /// `None` means claims never expire. Otherwise a job whose lease runs out
    /// is treated as stalled: the next claim puts it back in line and the lost
    /// run counts as one of its attempts.
    fn lease(&self) -> Option<Duration> {
        None
    }

    /// Extend the lease on a job this worker is still running
    async fn renew(&self, _job_id: &str) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::Backoff;

    fn options(max_attempts: u32) -> JobOptions {
        JobOptions::new(max_attempts, Backoff::fixed(10))
    }

    #[test]
    fn test_job_kind_names() {
        assert_eq!(JobKind::SendEmail.as_str(), "send-email");
        assert_eq!(JobKind::SendEmail.queue_name(), "email-queue");
        assert_eq!(JobKind::ProcessInteraction.as_str(), "process-interaction");
        assert_eq!(JobKind::ProcessInteraction.queue_name(), "interaction-queue");
    }

    #[test]
    fn test_begin_attempt_never_exceeds_max() {
        let mut job = JobData::new("q", "t", serde_json::json!({}), options(2));
        assert_eq!(job.begin_attempt().unwrap(), 1);
        assert!(job.should_retry());
        assert_eq!(job.begin_attempt().unwrap(), 2);
        assert!(!job.should_retry());
        assert!(job.begin_attempt().is_err());
        assert_eq!(job.attempts_made, 2);
    }

    #[test]
    fn test_is_ready() {
        let now = Utc::now();
        let mut job = JobData::new("q", "t", serde_json::json!({}), options(1));
        assert!(job.is_ready(now));

        job.available_at = Some(now + chrono::Duration::seconds(5));
        assert!(!job.is_ready(now));
        assert!(job.is_ready(now + chrono::Duration::seconds(5)));
    }

    #[test]
    fn test_job_data_serde_shape() {
        let job = JobData::new("email-queue", "send-email", serde_json::json!({"to": "a@b.c"}), options(3));
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["state"], "pending");
        assert_eq!(json["options"]["backoff"]["kind"], "fixed");

        let back: JobData = serde_json::from_value(json).unwrap();
        assert_eq!(back.job_id, job.job_id);
        assert_eq!(back.options, job.options);
    }
}
