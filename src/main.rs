//! writespace-worker: runs the email and interaction worker pools until
//! SIGINT/SIGTERM, then drains them and closes every connection.

use std::sync::Arc;

use writespace_jobs::email::{ConsoleMailer, SmtpMailer};
use writespace_jobs::{
    ConfigBuilder, DatabasePool, EmailDeliveryHandler, InMemoryJobQueue, InMemoryNotificationStore,
    InteractionHandler, JobBackend, JobKind, JobQueue, JobsConfig, LoggingObserver, Mailer,
    NotificationStore, RedisJobQueue, SeaOrmNotificationStore, ShutdownCoordinator, WorkerPool,
    init_tracing_with_config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigBuilder::new().from_env().build()?;
    init_tracing_with_config(&config);

    let email_queue = open_queue(&config.jobs, JobKind::SendEmail).await?;
    let interaction_queue = open_queue(&config.jobs, JobKind::ProcessInteraction).await?;

    let mailer: Arc<dyn Mailer> = match &config.email.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp.clone())?),
        None => {
            tracing::warn!("SMTP_HOST not set, emails will be logged instead of sent");
            Arc::new(ConsoleMailer::new())
        }
    };

    let database = match &config.database {
        Some(db) => Some(Arc::new(DatabasePool::connect(db).await?)),
        None => None,
    };
    let store: Arc<dyn NotificationStore> = match &database {
        Some(pool) => Arc::new(SeaOrmNotificationStore::from_pool(pool)),
        None => {
            tracing::warn!("DATABASE_URL not set, notifications are kept in memory only");
            Arc::new(InMemoryNotificationStore::new())
        }
    };

    let email_pool = Arc::new(
        WorkerPool::builder(
            email_queue.clone(),
            EmailDeliveryHandler::from_config(mailer, &config.email),
        )
        .concurrency(config.jobs.email_concurrency)
        .poll_interval(config.jobs.poll_interval())
        .observer(Arc::new(LoggingObserver))
        .start(),
    );

    let interaction_pool = Arc::new(
        WorkerPool::builder(interaction_queue.clone(), InteractionHandler::new(store))
            .concurrency(config.jobs.interaction_concurrency)
            .poll_interval(config.jobs.poll_interval())
            .observer(Arc::new(LoggingObserver))
            .start(),
    );

    tracing::info!(
        backend = ?config.jobs.backend,
        email_concurrency = config.jobs.email_concurrency,
        interaction_concurrency = config.jobs.interaction_concurrency,
        "Workers running"
    );

    let mut coordinator = ShutdownCoordinator::new()
        .with_step_timeout(config.shutdown.step_timeout())
        .pool(email_pool)
        .pool(interaction_pool)
        .queue(email_queue)
        .queue(interaction_queue);
    if let Some(database) = database {
        coordinator = coordinator.database(database);
    }

    let report = coordinator.run_until_signal().await;
    if !report.is_clean() {
        tracing::warn!(
            failed = report.failed.len(),
            attempted = report.attempted(),
            "Shutdown finished with errors"
        );
    }

    Ok(())
}

async fn open_queue(config: &JobsConfig, kind: JobKind) -> anyhow::Result<Arc<dyn JobQueue>> {
    let name = kind.queue_name();
    let queue: Arc<dyn JobQueue> = match config.backend {
        JobBackend::InMemory => {
            tracing::warn!(queue = name, "Using in-memory job queue; jobs are lost on restart");
            Arc::new(InMemoryJobQueue::new(name))
        }
        JobBackend::Redis => {
            let queue = RedisJobQueue::new(
                &config.redis_url,
                config.redis_password.as_deref(),
                &config.key_prefix,
                name,
            )?
            .with_lease(config.lease())
            .with_history_limit(config.history_limit);
            if !queue.ping().await {
                // Workers keep polling and reconnect once Redis is reachable
                tracing::warn!(queue = name, "Redis is not reachable yet");
            }
            Arc::new(queue)
        }
    };
    Ok(queue)
}
