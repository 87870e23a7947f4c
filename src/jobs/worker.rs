//! Worker pools for processing background jobs
//!
//! A pool serves one queue with one handler. A dispatcher task claims jobs while
//! it holds a concurrency permit and runs each claimed job on its own task, so at
//! most `concurrency` jobs of the pool execute at any moment. On queues that
//! lease their claims, a running job's lease is renewed until the handler returns.

use crate::error::{JobsError, Result};
use crate::jobs::events::JobObserver;
use crate::jobs::handler::JobHandler;
use crate::traits::job::{FailOutcome, JobData, JobQueue};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{Mutex, Semaphore, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Duration, Instant, MissedTickBehavior, interval_at, sleep};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Builder for [`WorkerPool`]
pub struct WorkerPoolBuilder<H: JobHandler> {
    queue: Arc<dyn JobQueue>,
    handler: H,
    concurrency: usize,
    poll_interval: Duration,
    observers: Vec<Arc<dyn JobObserver>>,
}

impl<H: JobHandler> WorkerPoolBuilder<H> {
    /// Maximum number of jobs executing at once (at least 1)
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// How long to wait before polling an empty queue again
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn JobObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Spawn the dispatcher and return the running pool
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(self) -> WorkerPool {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let queue_name = self.queue.name().to_string();

        let runner = JobRunner {
            queue: self.queue,
            handler: Arc::new(self.handler),
            observers: self.observers.into(),
            in_flight: in_flight.clone(),
        };
        let dispatcher = Dispatcher {
            runner,
            semaphore: Arc::new(Semaphore::new(self.concurrency)),
            concurrency: self.concurrency,
            poll_interval: self.poll_interval,
        };

        let handle = tokio::spawn(dispatcher.run(shutdown_rx));

        WorkerPool {
            queue_name,
            concurrency: self.concurrency,
            shutdown_tx,
            dispatcher: Mutex::new(Some(handle)),
            in_flight,
            closed: AtomicBool::new(false),
        }
    }
}

/// A running pool of workers bound to one queue
///
/// # Example
///
/// ```rust,ignore
/// let pool = WorkerPool::builder(queue, EmailDeliveryHandler::new(mailer))
///     .concurrency(5)
///     .start();
///
/// // later, during shutdown
/// pool.close().await?;
/// ```
pub struct WorkerPool {
    queue_name: String,
    concurrency: usize,
    shutdown_tx: watch::Sender<bool>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    in_flight: Arc<AtomicUsize>,
    closed: AtomicBool,
}

impl WorkerPool {
    pub fn builder<H: JobHandler>(queue: Arc<dyn JobQueue>, handler: H) -> WorkerPoolBuilder<H> {
        WorkerPoolBuilder {
            queue,
            handler,
            concurrency: 1,
            poll_interval: DEFAULT_POLL_INTERVAL,
            observers: Vec::new(),
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Number of jobs currently executing
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stop claiming new jobs and wait for in-flight jobs to finish
    ///
    /// Jobs already claimed are run to completion and their outcome recorded.
    /// The pool's handle on the queue is released afterwards. Calling this again
    /// (or concurrently) waits for the same drain and then returns `Ok`.
    pub async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::info!(queue = %self.queue_name, "Closing worker pool");
        }
        self.shutdown_tx.send_replace(true);

        // Held across the await so concurrent callers return only after the drain
        let mut dispatcher = self.dispatcher.lock().await;
        if let Some(handle) = dispatcher.take() {
            handle.await.map_err(|e| {
                JobsError::internal(format!(
                    "Worker pool {} dispatcher failed: {}",
                    self.queue_name, e
                ))
            })?;
        }
        Ok(())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Stop polling if the pool is dropped without being closed
        self.shutdown_tx.send_replace(true);
    }
}

struct Dispatcher<H: JobHandler> {
    runner: JobRunner<H>,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    poll_interval: Duration,
}

impl<H: JobHandler> Dispatcher<H> {
    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let queue_name = self.runner.queue.name().to_string();
        tracing::info!(queue = %queue_name, concurrency = self.concurrency, "Worker pool started");

        let mut tasks = JoinSet::new();

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let permit = tokio::select! {
                _ = shutdown_rx.changed() => break,
                permit = self.semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            // Shutdown may have been requested while waiting for a free slot
            if *shutdown_rx.borrow() {
                break;
            }

            match self.runner.queue.claim().await {
                Ok(Some(job)) => {
                    let runner = self.runner.clone();
                    tasks.spawn(async move {
                        let _permit = permit;
                        runner.process(job).await;
                    });
                }
                Ok(None) => {
                    drop(permit);
                    if idle(&mut shutdown_rx, self.poll_interval).await {
                        break;
                    }
                }
                Err(e) => {
                    drop(permit);
                    tracing::error!(queue = %queue_name, error = %e, "Failed to claim job");
                    if idle(&mut shutdown_rx, self.poll_interval.max(Duration::from_secs(1))).await {
                        break;
                    }
                }
            }

            while let Some(result) = tasks.try_join_next() {
                log_task_result(&queue_name, result);
            }
        }

        if !tasks.is_empty() {
            tracing::info!(queue = %queue_name, in_flight = tasks.len(), "Waiting for in-flight jobs");
        }
        while let Some(result) = tasks.join_next().await {
            log_task_result(&queue_name, result);
        }

        tracing::info!(queue = %queue_name, "Worker pool stopped");
    }
}

/// Sleep for `period` unless shutdown is requested first; true means stop
async fn idle(shutdown_rx: &mut watch::Receiver<bool>, period: Duration) -> bool {
    tokio::select! {
        _ = shutdown_rx.changed() => true,
        _ = sleep(period) => false,
    }
}

fn log_task_result(queue: &str, result: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        tracing::error!(queue = %queue, error = %e, "Job task aborted");
    }
}

/// Everything a spawned job task needs
struct JobRunner<H: JobHandler> {
    queue: Arc<dyn JobQueue>,
    handler: Arc<H>,
    observers: Arc<[Arc<dyn JobObserver>]>,
    in_flight: Arc<AtomicUsize>,
}

impl<H: JobHandler> Clone for JobRunner<H> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            handler: self.handler.clone(),
            observers: self.observers.clone(),
            in_flight: self.in_flight.clone(),
        }
    }
}

impl<H: JobHandler> JobRunner<H> {
    async fn process(&self, job: JobData) {
        let job_id = job.job_id.clone();
        tracing::debug!(
            queue = %job.queue,
            job_id = %job_id,
            job_type = %job.job_type,
            attempt = job.attempt(),
            "Processing job"
        );

        self.in_flight.fetch_add(1, Ordering::AcqRel);
        let result = match self.queue.lease() {
            Some(lease) => self.execute_leased(&job, lease).await,
            None => self.execute(&job).await,
        };

        match result {
            Ok(()) => match self.queue.complete(&job_id).await {
                Ok(()) => {
                    tracing::info!(queue = %job.queue, job_id = %job_id, "Job completed successfully");
                    for observer in self.observers.iter() {
                        observer.completed(&job);
                    }
                }
                Err(e) => {
                    tracing::error!(queue = %job.queue, job_id = %job_id, error = %e, "Failed to mark job completed");
                }
            },
            Err(error) => match self.queue.fail(&job_id, &error.to_string()).await {
                Ok(FailOutcome::Retrying { attempt, delay }) => {
                    tracing::warn!(
                        queue = %job.queue,
                        job_id = %job_id,
                        attempt,
                        retry_in_ms = delay.as_millis() as u64,
                        error = %error,
                        "Job attempt failed, retry scheduled"
                    );
                }
                Ok(FailOutcome::Failed { attempts }) => {
                    tracing::error!(
                        queue = %job.queue,
                        job_id = %job_id,
                        attempts,
                        error = %error,
                        "Job failed"
                    );
                    for observer in self.observers.iter() {
                        observer.failed(&job, &error);
                    }
                }
                Err(e) => {
                    tracing::error!(
                        queue = %job.queue,
                        job_id = %job_id,
                        error = %e,
                        job_error = %error,
                        "Failed to record job failure"
                    );
                }
            },
        }

        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }

    /// Run the handler while renewing the job's lease every third of its length
    async fn execute_leased(&self, job: &JobData, lease: Duration) -> Result<()> {
        let period = (lease / 3).max(Duration::from_millis(10));
        let mut heartbeat = interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let execution = self.execute(job);
        tokio::pin!(execution);

        loop {
            tokio::select! {
                result = &mut execution => return result,
                _ = heartbeat.tick() => {
                    if let Err(e) = self.queue.renew(&job.job_id).await {
                        tracing::warn!(queue = %job.queue, job_id = %job.job_id, error = %e, "Failed to renew job lease");
                    }
                }
            }
        }
    }

    /// Run the handler once, turning bad payloads and panics into errors
    async fn execute(&self, job: &JobData) -> Result<()> {
        if job.job_type != H::KIND.as_str() {
            return Err(JobsError::handler(format!(
                "No handler for job type '{}' on queue {}",
                job.job_type, job.queue
            )));
        }

        let payload: H::Payload = serde_json::from_value(job.payload.clone()).map_err(|e| {
            JobsError::handler(format!("Invalid payload for job {}: {}", job.job_id, e))
        })?;

        match AssertUnwindSafe(self.handler.handle(job, payload))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => Err(JobsError::handler(format!(
                "Job handler panicked: {}",
                panic_message(panic.as_ref())
            ))),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");

        let boxed: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
