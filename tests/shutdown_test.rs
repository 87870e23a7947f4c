use async_trait::async_trait;
use futures::future::Ready;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use writespace_jobs::shutdown::ShutdownPhase;
use writespace_jobs::{
    ChannelObserver, InMemoryJobQueue, JobData, JobEvent, JobHandler, JobKind, JobOptions,
    JobQueue, JobsError, Result, ShutdownCoordinator, ShutdownState, WorkerPool,
};

type Log = Arc<Mutex<Vec<String>>>;

fn record(log: &Log, name: &'static str) -> impl Fn() -> Ready<Result<()>> + Send + Sync + 'static {
    let log = log.clone();
    move || {
        log.lock().unwrap().push(name.to_string());
        futures::future::ready(Ok(()))
    }
}

#[tokio::test]
async fn test_steps_run_in_phase_order_regardless_of_registration() {
    let log: Log = Arc::default();
    let coordinator = ShutdownCoordinator::new()
        .connection("redis", record(&log, "redis"))
        .step(ShutdownPhase::Pools, "email pool", record(&log, "email pool"))
        .connection("postgres", record(&log, "postgres"))
        .listener("http", record(&log, "http"))
        .step(ShutdownPhase::Pools, "interaction pool", record(&log, "interaction pool"));

    let report = coordinator.shutdown().await;

    assert!(report.is_clean());
    assert_eq!(
        *log.lock().unwrap(),
        vec!["http", "email pool", "interaction pool", "redis", "postgres"]
    );
    assert_eq!(report.completed, *log.lock().unwrap());
}

#[tokio::test]
async fn test_failed_step_does_not_stop_later_steps() {
    let log: Log = Arc::default();
    let coordinator = ShutdownCoordinator::new()
        .listener("http", || async { Err::<(), _>(JobsError::internal("listener already gone")) })
        .step(ShutdownPhase::Pools, "pool", record(&log, "pool"))
        .connection("redis", record(&log, "redis"));

    let report = coordinator.shutdown().await;

    assert!(!report.is_clean());
    assert_eq!(report.attempted(), 3);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].phase, ShutdownPhase::Listener);
    assert_eq!(report.failed[0].step, "http");
    assert!(report.failed[0].error.contains("listener already gone"));
    assert_eq!(*log.lock().unwrap(), vec!["pool", "redis"]);
    assert_eq!(coordinator.state(), ShutdownState::Stopped);
}

#[tokio::test]
async fn test_second_shutdown_is_a_no_op() {
    let log: Log = Arc::default();
    let coordinator = ShutdownCoordinator::new().connection("redis", record(&log, "redis"));

    let first = coordinator.shutdown().await;
    let second = coordinator.shutdown().await;

    assert_eq!(first.completed, vec!["redis".to_string()]);
    assert_eq!(second.attempted(), 0);
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_shutdown_runs_steps_once() {
    let log: Log = Arc::default();
    let coordinator = ShutdownCoordinator::new().connection("redis", record(&log, "redis"));

    let (a, b) = tokio::join!(coordinator.shutdown(), coordinator.shutdown());

    assert_eq!(a.attempted() + b.attempted(), 1);
    assert_eq!(log.lock().unwrap().len(), 1);
}

struct SlowHandler {
    finished: Arc<AtomicBool>,
    delay: Duration,
}

#[async_trait]
impl JobHandler for SlowHandler {
    type Payload = serde_json::Value;
    const KIND: JobKind = JobKind::SendEmail;

    async fn handle(&self, _job: &JobData, _payload: serde_json::Value) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        self.finished.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_pools_drain_before_queues_close() {
    let queue: Arc<dyn JobQueue> = Arc::new(InMemoryJobQueue::new(JobKind::SendEmail.queue_name()));
    let finished = Arc::new(AtomicBool::new(false));
    let handler = SlowHandler {
        finished: finished.clone(),
        delay: Duration::from_millis(150),
    };
    let pool = Arc::new(
        WorkerPool::builder(queue.clone(), handler)
            .poll_interval(Duration::from_millis(10))
            .start(),
    );

    let job = JobData::new(queue.name(), "send-email", json!({}), JobOptions::default());
    queue.enqueue(job).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while pool.in_flight() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("job never started");

    // Registered queue-first on purpose; the pool must still drain before the queue closes
    let coordinator = ShutdownCoordinator::new()
        .queue(queue.clone())
        .pool(pool.clone());
    let mut state = coordinator.subscribe();

    let report = coordinator.shutdown().await;

    assert!(report.is_clean(), "{:?}", report.failed);
    assert_eq!(
        report.completed,
        vec!["worker pool email-queue".to_string(), "queue email-queue".to_string()]
    );
    assert!(finished.load(Ordering::SeqCst));
    assert!(pool.is_closed());
    assert_eq!(pool.in_flight(), 0);
    assert!(!queue.is_healthy());
    assert_eq!(*state.borrow_and_update(), ShutdownState::Stopped);

    let late = JobData::new(queue.name(), "send-email", json!({}), JobOptions::default());
    assert!(queue.enqueue(late).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_pool_drain_outlives_step_timeout() {
    let queue: Arc<dyn JobQueue> = Arc::new(InMemoryJobQueue::new(JobKind::SendEmail.queue_name()));
    let finished = Arc::new(AtomicBool::new(false));
    let (observer, mut events) = ChannelObserver::new();
    let pool = Arc::new(
        WorkerPool::builder(
            queue.clone(),
            SlowHandler {
                finished: finished.clone(),
                delay: Duration::from_millis(500),
            },
        )
        .poll_interval(Duration::from_millis(10))
        .observer(Arc::new(observer))
        .start(),
    );

    let job = JobData::new(queue.name(), "send-email", json!({}), JobOptions::default());
    let handle = queue.enqueue(job).await.unwrap();
    while pool.in_flight() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let coordinator = ShutdownCoordinator::new()
        .with_step_timeout(Some(Duration::from_millis(100)))
        .pool(pool.clone())
        .queue(queue.clone());

    let report = coordinator.shutdown().await;

    assert!(report.is_clean(), "{:?}", report.failed);
    assert!(finished.load(Ordering::SeqCst));
    // The outcome reached the queue before it was closed
    assert_eq!(
        events.try_recv().unwrap(),
        JobEvent::Completed {
            queue: "email-queue".to_string(),
            job_id: handle.id,
        }
    );
    assert!(!queue.is_healthy());
}

#[tokio::test(start_paused = true)]
async fn test_step_timeout_still_bounds_connections() {
    let log: Log = Arc::default();
    let coordinator = ShutdownCoordinator::new()
        .with_step_timeout(Some(Duration::from_millis(100)))
        .connection("stuck", || async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .connection("redis", record(&log, "redis"));

    let report = coordinator.shutdown().await;

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].step, "stuck");
    assert_eq!(*log.lock().unwrap(), vec!["redis"]);
}
