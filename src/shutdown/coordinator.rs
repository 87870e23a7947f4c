//! Shutdown coordinator
//!
//! Runs registered shutdown steps in three phases: first the inbound listener,
//! then the worker pools (each drained in registration order), then shared
//! connections. Every step is attempted even if an earlier one fails, times out
//! or panics; failures are logged and collected in the [`ShutdownReport`].
//!
//! Pool drains are never cut short by the step timeout: a claimed job runs to
//! completion and its outcome is recorded before any connection is closed.

use super::signal::shutdown_signal;
use crate::error::{JobsError, Result};
use crate::jobs::WorkerPool;
use crate::traits::job::JobQueue;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};

const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(30);

/// Lifecycle of the process as seen by the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    Draining,
    Stopped,
}

/// Ordering group of a shutdown step
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShutdownPhase {
    /// Stop accepting inbound requests
    Listener,
    /// Drain worker pools
    Pools,
    /// Close queue store, database and other shared connections
    Connections,
}

impl fmt::Display for ShutdownPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Listener => "listener",
            Self::Pools => "pools",
            Self::Connections => "connections",
        })
    }
}

/// A step that returned an error, timed out or panicked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    pub phase: ShutdownPhase,
    pub step: String,
    pub error: String,
}

/// Outcome of a shutdown run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Steps that finished successfully, in execution order
    pub completed: Vec<String>,
    pub failed: Vec<StepFailure>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of steps attempted
    pub fn attempted(&self) -> usize {
        self.completed.len() + self.failed.len()
    }
}

type StepFn = Box<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

struct ShutdownStep {
    phase: ShutdownPhase,
    name: String,
    /// Subject to the coordinator's step timeout
    bounded: bool,
    run: StepFn,
}

/// Coordinates graceful shutdown of the listener, worker pools and connections
///
/// # Example
///
/// ```rust,ignore
/// let coordinator = ShutdownCoordinator::new()
///     .pool(email_pool.clone())
///     .pool(interaction_pool.clone())
///     .queue(email_queue.clone())
///     .queue(interaction_queue.clone())
///     .database(db.clone());
///
/// let report = coordinator.run_until_signal().await;
/// ```
pub struct ShutdownCoordinator {
    steps: Vec<ShutdownStep>,
    step_timeout: Option<Duration>,
    state_tx: watch::Sender<ShutdownState>,
    run_lock: Mutex<()>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(ShutdownState::Running);
        Self {
            steps: Vec::new(),
            step_timeout: Some(DEFAULT_STEP_TIMEOUT),
            state_tx,
            run_lock: Mutex::new(()),
        }
    }

    /// Bound each listener and connection step; `None` waits indefinitely
    ///
    /// Worker pool drains registered with [`pool`](Self::pool) always wait for
    /// their in-flight jobs.
    pub fn with_step_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.step_timeout = timeout;
        self
    }

    /// Register a step in `phase`; steps of one phase run in registration order
    pub fn step<F, Fut>(self, phase: ShutdownPhase, name: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.push(phase, name.into(), true, f)
    }

    fn push<F, Fut>(mut self, phase: ShutdownPhase, name: String, bounded: bool, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.steps.push(ShutdownStep {
            phase,
            name,
            bounded,
            run: Box::new(move || f().boxed()),
        });
        self
    }

    /// Stop accepting inbound requests (for example an HTTP server's graceful-shutdown trigger)
    pub fn listener<F, Fut>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.step(ShutdownPhase::Listener, name, f)
    }

    /// Drain a worker pool, waiting for every in-flight job regardless of the step timeout
    pub fn pool(self, pool: Arc<WorkerPool>) -> Self {
        let name = format!("worker pool {}", pool.queue_name());
        self.push(ShutdownPhase::Pools, name, false, move || {
            let pool = pool.clone();
            async move { pool.close().await }
        })
    }

    /// Close a queue's store connection
    pub fn queue(self, queue: Arc<dyn JobQueue>) -> Self {
        let name = format!("queue {}", queue.name());
        self.step(ShutdownPhase::Connections, name, move || {
            let queue = queue.clone();
            async move { queue.close().await }
        })
    }

    #[cfg(feature = "database")]
    pub fn database(self, pool: Arc<crate::database::DatabasePool>) -> Self {
        self.step(ShutdownPhase::Connections, "database", move || {
            let pool = pool.clone();
            async move { pool.close().await }
        })
    }

    /// Close any other shared connection (cache, session store, ...)
    pub fn connection<F, Fut>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.step(ShutdownPhase::Connections, name, f)
    }

    pub fn state(&self) -> ShutdownState {
        *self.state_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ShutdownState> {
        self.state_tx.subscribe()
    }

    /// Wait for Ctrl+C or SIGTERM, then shut down
    pub async fn run_until_signal(&self) -> ShutdownReport {
        shutdown_signal().await;
        self.shutdown().await
    }

    /// Run every step once
    ///
    /// Later (or concurrent) calls wait for the first run to finish and return
    /// an empty report.
    pub async fn shutdown(&self) -> ShutdownReport {
        let _guard = self.run_lock.lock().await;
        let mut report = ShutdownReport::default();

        if self.state() != ShutdownState::Running {
            return report;
        }
        self.state_tx.send_replace(ShutdownState::Draining);
        tracing::info!(steps = self.steps.len(), "Graceful shutdown started");

        let mut steps: Vec<&ShutdownStep> = self.steps.iter().collect();
        steps.sort_by_key(|step| step.phase);

        for step in steps {
            tracing::info!(phase = %step.phase, step = %step.name, "Running shutdown step");
            match self.run_step(step).await {
                Ok(()) => {
                    tracing::info!(phase = %step.phase, step = %step.name, "Shutdown step finished");
                    report.completed.push(step.name.clone());
                }
                Err(e) => {
                    tracing::error!(phase = %step.phase, step = %step.name, error = %e, "Shutdown step failed");
                    report.failed.push(StepFailure {
                        phase: step.phase,
                        step: step.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        self.state_tx.send_replace(ShutdownState::Stopped);
        tracing::info!(
            completed = report.completed.len(),
            failed = report.failed.len(),
            "Graceful shutdown finished"
        );
        report
    }

    async fn run_step(&self, step: &ShutdownStep) -> Result<()> {
        let fut = AssertUnwindSafe((step.run)()).catch_unwind();
        let limit = self.step_timeout.filter(|_| step.bounded);
        let outcome = match limit {
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
                JobsError::timeout(format!("{} did not finish within {:?}", step.name, limit))
            })?,
            None => fut.await,
        };
        outcome.map_err(|_| JobsError::internal(format!("{} panicked", step.name)))?
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ShutdownCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownCoordinator")
            .field("steps", &self.steps.iter().map(|s| &s.name).collect::<Vec<_>>())
            .field("step_timeout", &self.step_timeout)
            .field("state", &self.state())
            .finish()
    }
}
