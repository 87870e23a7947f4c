//! writespace-jobs - background email and notification processing for Writespace
//!
//! Request handlers enqueue work through the [`Producer`] and return
//! immediately. Worker pools claim jobs from durable named queues, run one typed
//! handler per queue with bounded concurrency, retry failures with fixed or
//! exponential backoff, and drain cleanly on shutdown.
//!
//! # Features
//!
//! - **Queues**: Redis-backed (`jobs-redis`) or in-memory, at-least-once delivery
//! - **Workers**: semaphore-bounded pools with completion/failure observers
//! - **Email**: SMTP via lettre (`email`), console transport for development,
//!   stale OTP emails skipped
//! - **Notifications**: Postgres via SeaORM (`database`) or in-memory
//! - **Shutdown**: ordered listener, pool and connection teardown
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use writespace_jobs::{
//!     EmailDeliveryHandler, InMemoryJobQueue, JobKind, JobQueue, Producer, WorkerPool,
//!     email::ConsoleMailer, queues::EmailJob,
//! };
//!
//! #[tokio::main]
//! async fn main() -> writespace_jobs::Result<()> {
//!     writespace_jobs::init_tracing();
//!
//!     let email_queue: Arc<dyn JobQueue> =
//!         Arc::new(InMemoryJobQueue::new(JobKind::SendEmail.queue_name()));
//!     let interaction_queue: Arc<dyn JobQueue> =
//!         Arc::new(InMemoryJobQueue::new(JobKind::ProcessInteraction.queue_name()));
//!
//!     let handler = EmailDeliveryHandler::new(Arc::new(ConsoleMailer::new()), "noreply@writespace.app");
//!     let pool = WorkerPool::builder(email_queue.clone(), handler).concurrency(5).start();
//!
//!     let producer = Producer::new(email_queue, interaction_queue);
//!     producer
//!         .add_email_job(EmailJob::new("user@example.com", "Welcome", "<html>...</html>"))
//!         .await?;
//!
//!     pool.close().await
//! }
//! ```

mod config;
pub mod email;
mod error;
pub mod jobs;
pub mod notifications;
pub mod queues;
pub mod shutdown;
pub mod traits;
mod utils;
pub mod workers;

#[cfg(feature = "database")]
pub mod database;

// Re-exports for public API
pub use config::{Config, ConfigBuilder, LoggingConfig};
pub use error::{JobsError, Result};
pub use jobs::{
    Backoff, BackoffKind, ChannelObserver, InMemoryJobQueue, JobBackend, JobEvent, JobHandler,
    JobObserver, JobOptions, JobsConfig, LoggingObserver, WorkerPool, WorkerPoolBuilder,
};
pub use notifications::{
    InMemoryNotificationStore, NotificationService, NotificationStore, NotificationType,
};
pub use queues::{EmailJob, InteractionJob, Producer};
pub use shutdown::{ShutdownCoordinator, ShutdownReport, ShutdownState, shutdown_signal};
pub use traits::job::{
    FailOutcome, Job, JobCounts, JobData, JobHandle, JobKind, JobQueue, JobState,
};
pub use traits::mailer::{Email, Mailer};
pub use workers::{EmailDeliveryHandler, InteractionHandler};

#[cfg(feature = "jobs-redis")]
pub use jobs::RedisJobQueue;
#[cfg(feature = "email")]
pub use email::SmtpMailer;
#[cfg(feature = "database")]
pub use database::DatabasePool;
#[cfg(feature = "database")]
pub use notifications::SeaOrmNotificationStore;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging with sensible defaults
///
/// This should be called early, typically at the top of `main()`.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "debug", "writespace_jobs=debug")
/// - `WRITESPACE_LOG_JSON`: Set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("WRITESPACE_LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    install_subscriber(env_filter, json_logs);
}

/// Initialize tracing from [`LoggingConfig`]
///
/// `RUST_LOG`, when set, still takes precedence over the configured level.
pub fn init_tracing_with_config(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    install_subscriber(env_filter, config.logging.json);
}

fn install_subscriber(env_filter: EnvFilter, json: bool) {
    // try_init: a subscriber may already be installed (tests, embedding apps)
    let result = if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "Tracing subscriber already installed");
    }
}
