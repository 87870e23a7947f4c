//! Completion and failure hooks for worker pools

use crate::error::JobsError;
use crate::traits::job::JobData;
use tokio::sync::mpsc;

/// Receives terminal job events from a worker pool
///
/// `completed` fires after the queue recorded a success. `failed` fires only
/// once retries are exhausted, never for a failed attempt that will be retried.
pub trait JobObserver: Send + Sync {
    fn completed(&self, _job: &JobData) {}

    fn failed(&self, _job: &JobData, _error: &JobsError) {}
}

/// Observer that logs terminal events with the job's queue and id
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingObserver;

impl JobObserver for LoggingObserver {
    fn completed(&self, job: &JobData) {
        tracing::info!(
            queue = %job.queue,
            job_id = %job.job_id,
            attempts = job.attempts_made,
            "{} job {} completed",
            job.job_type,
            job.job_id
        );
    }

    fn failed(&self, job: &JobData, error: &JobsError) {
        tracing::error!(
            queue = %job.queue,
            job_id = %job.job_id,
            attempts = job.attempts_made,
            error = %error,
            "{} job {} failed",
            job.job_type,
            job.job_id
        );
    }
}

/// A terminal job event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    Completed {
        queue: String,
        job_id: String,
    },
    Failed {
        queue: String,
        job_id: String,
        attempts: u32,
        error: String,
    },
}

impl JobEvent {
    pub fn job_id(&self) -> &str {
        match self {
            Self::Completed { job_id, .. } | Self::Failed { job_id, .. } => job_id,
        }
    }
}

/// Observer that forwards events to an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<JobEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<JobEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl JobObserver for ChannelObserver {
    fn completed(&self, job: &JobData) {
        // A dropped receiver just means nobody is listening anymore
        let _ = self.tx.send(JobEvent::Completed {
            queue: job.queue.clone(),
            job_id: job.job_id.clone(),
        });
    }

    fn failed(&self, job: &JobData, error: &JobsError) {
        let _ = self.tx.send(JobEvent::Failed {
            queue: job.queue.clone(),
            job_id: job.job_id.clone(),
            attempts: job.attempts_made,
            error: error.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobOptions;

    #[test]
    fn test_channel_observer_forwards_events() {
        let (observer, mut rx) = ChannelObserver::new();
        let mut job = JobData::new("q", "t", serde_json::json!({}), JobOptions::default());
        job.attempts_made = 3;

        observer.completed(&job);
        observer.failed(&job, &JobsError::handler("boom"));

        assert_eq!(
            rx.try_recv().unwrap(),
            JobEvent::Completed {
                queue: "q".to_string(),
                job_id: job.job_id.clone(),
            }
        );
        match rx.try_recv().unwrap() {
            JobEvent::Failed { attempts, error, .. } => {
                assert_eq!(attempts, 3);
                assert_eq!(error, "Handler error: boom");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_channel_observer_ignores_closed_receiver() {
        let (observer, rx) = ChannelObserver::new();
        drop(rx);
        let job = JobData::new("q", "t", serde_json::json!({}), JobOptions::default());
        observer.completed(&job);
    }
}
