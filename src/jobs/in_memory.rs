//! In-memory job queue implementation
//!
//! This implementation uses in-memory data structures and is suitable for
//! development, testing, and single-instance deployments.

use crate::error::{JobsError, Result};
use crate::jobs::options::visible_after;
use crate::traits::job::{FailOutcome, JobCounts, JobData, JobHandle, JobQueue, JobState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// Default maximum size for completed/failed job history
pub(crate) const DEFAULT_MAX_HISTORY_SIZE: usize = 10_000;

/// Wall-clock time that advances with tokio's clock
///
/// Retry visibility follows `tokio::time`, so paused-clock tests see backoff
/// delays elapse without sleeping for real.
#[derive(Debug, Clone, Copy)]
struct QueueClock {
    wall: DateTime<Utc>,
    started: tokio::time::Instant,
}

impl QueueClock {
    fn start() -> Self {
        Self {
            wall: Utc::now(),
            started: tokio::time::Instant::now(),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        visible_after(self.wall, self.started.elapsed())
    }
}

#[derive(Default)]
struct QueueState {
    /// Every job the queue still holds, by id
    jobs: HashMap<String, JobData>,
    pending: VecDeque<String>,
    /// Delayed retries ordered by visibility time, ties broken by insertion order
    delayed: BTreeMap<(DateTime<Utc>, u64), String>,
    active: HashSet<String>,
    /// Bounded history of retained completed jobs (oldest removed when full)
    completed: VecDeque<String>,
    /// Bounded history of retained failed jobs (oldest removed when full)
    failed: VecDeque<String>,
    seq: u64,
}

impl QueueState {
    /// Move every delayed job that is due at `now` to the back of the pending list
    fn promote_due(&mut self, now: DateTime<Utc>) {
        while let Some(entry) = self.delayed.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let job_id = entry.remove();
            self.pending.push_back(job_id);
        }
    }

    /// Add job to bounded history, dropping the oldest entry if at capacity
    fn push_to_bounded_history(
        jobs: &mut HashMap<String, JobData>,
        history: &mut VecDeque<String>,
        job_id: String,
        max_size: usize,
    ) {
        if history.len() >= max_size {
            if let Some(oldest) = history.pop_front() {
                jobs.remove(&oldest);
            }
        }
        history.push_back(job_id);
    }

    fn take_active(&mut self, queue: &str, job_id: &str) -> Result<JobData> {
        if !self.active.remove(job_id) {
            return Err(JobsError::internal(format!(
                "Job {} is not active on queue {}",
                job_id, queue
            )));
        }
        self.jobs
            .remove(job_id)
            .ok_or_else(|| JobsError::internal(format!("Job {} missing from queue {}", job_id, queue)))
    }
}

/// In-memory job queue implementation
///
/// This queue stores jobs in memory and is suitable for:
/// - Development and testing
/// - Single-instance deployments
/// - Jobs that don't need persistence across restarts
///
/// All state lives behind a single mutex, so claims are exclusive: a job is
/// handed to at most one caller of [`JobQueue::claim`] at a time.
///
/// # Resource Limits
///
/// Retained completed and failed jobs are bounded to prevent unbounded memory
/// growth. By default each list keeps the most recent 10,000 jobs.
#[derive(Clone)]
pub struct InMemoryJobQueue {
    name: String,
    state: Arc<Mutex<QueueState>>,
    /// Maximum size of completed/failed history lists
    max_history_size: usize,
    clock: QueueClock,
    closed: Arc<AtomicBool>,
}

impl InMemoryJobQueue {
    /// Create a new in-memory job queue
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_history_limit(name, DEFAULT_MAX_HISTORY_SIZE)
    }

    /// Create a new in-memory job queue with custom history limit
    pub fn with_history_limit(name: impl Into<String>, max_history_size: usize) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(QueueState::default())),
            max_history_size: max_history_size.max(1),
            clock: QueueClock::start(),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(JobsError::store(format!("Queue {} is closed", self.name)));
        }
        Ok(())
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn enqueue(&self, mut job: JobData) -> Result<JobHandle> {
        self.ensure_open()?;
        job.options.validate()?;
        job.queue = self.name.clone();
        job.state = JobState::Pending;

        let handle = JobHandle {
            id: job.job_id.clone(),
            queue: self.name.clone(),
        };

        let mut state = self.state.lock().await;
        let now = self.clock.now();
        match job.available_at {
            Some(at) if at > now => {
                state.seq += 1;
                let seq = state.seq;
                state.delayed.insert((at, seq), job.job_id.clone());
            }
            _ => state.pending.push_back(job.job_id.clone()),
        }
        state.jobs.insert(job.job_id.clone(), job);

        Ok(handle)
    }

    async fn claim(&self) -> Result<Option<JobData>> {
        self.ensure_open()?;
        let mut state = self.state.lock().await;
        state.promote_due(self.clock.now());

        while let Some(job_id) = state.pending.pop_front() {
            let Some(job) = state.jobs.get_mut(&job_id) else {
                continue;
            };
            match job.begin_attempt() {
                Ok(_) => {
                    let claimed = job.clone();
                    state.active.insert(job_id);
                    return Ok(Some(claimed));
                }
                Err(e) => {
                    // Attempts already exhausted: park it as failed instead of running it again
                    tracing::warn!(queue = %self.name, job_id = %job_id, error = %e, "Dropping exhausted job from pending list");
                    job.state = JobState::Failed;
                    job.finished_at = Some(self.clock.now());
                    let QueueState { jobs, failed, .. } = &mut *state;
                    QueueState::push_to_bounded_history(jobs, failed, job_id, self.max_history_size);
                }
            }
        }

        Ok(None)
    }

    async fn complete(&self, job_id: &str) -> Result<()> {
        self.ensure_open()?;
        let mut state = self.state.lock().await;
        let mut job = state.take_active(&self.name, job_id)?;

        if job.options.remove_on_complete {
            return Ok(());
        }

        job.state = JobState::Completed;
        job.finished_at = Some(self.clock.now());
        let job_id = job.job_id.clone();
        state.jobs.insert(job_id.clone(), job);
        let QueueState { jobs, completed, .. } = &mut *state;
        QueueState::push_to_bounded_history(jobs, completed, job_id, self.max_history_size);
        Ok(())
    }

    async fn fail(&self, job_id: &str, error: &str) -> Result<FailOutcome> {
        self.ensure_open()?;
        let mut state = self.state.lock().await;
        let mut job = state.take_active(&self.name, job_id)?;
        job.last_error = Some(error.to_string());

        if job.should_retry() {
            let attempt = job.attempts_made;
            let delay = job.options.backoff.delay_for(attempt);
            let retry_at = visible_after(self.clock.now(), delay);

            job.state = JobState::Pending;
            job.available_at = Some(retry_at);
            state.seq += 1;
            let seq = state.seq;
            state.delayed.insert((retry_at, seq), job.job_id.clone());
            state.jobs.insert(job.job_id.clone(), job);

            return Ok(FailOutcome::Retrying { attempt, delay });
        }

        let attempts = job.attempts_made;
        if !job.options.remove_on_fail {
            job.state = JobState::Failed;
            job.finished_at = Some(self.clock.now());
            let job_id = job.job_id.clone();
            state.jobs.insert(job_id.clone(), job);
            let QueueState { jobs, failed, .. } = &mut *state;
            QueueState::push_to_bounded_history(jobs, failed, job_id, self.max_history_size);
        }

        Ok(FailOutcome::Failed { attempts })
    }

    async fn get(&self, job_id: &str) -> Result<Option<JobData>> {
        self.ensure_open()?;
        let state = self.state.lock().await;
        Ok(state.jobs.get(job_id).cloned())
    }

    async fn counts(&self) -> Result<JobCounts> {
        self.ensure_open()?;
        let state = self.state.lock().await;
        Ok(JobCounts {
            pending: state.pending.len() + state.delayed.len(),
            active: state.active.len(),
            completed: state.completed.len(),
            failed: state.failed.len(),
        })
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!(queue = %self.name, "In-memory job queue closed");
        }
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }
}
