//! Queue behaviour against a live Redis server
//!
//! Run with `cargo test --test redis_queue_test -- --ignored`; `REDIS_URL`
//! overrides the default local server. Every test works under its own key
//! prefix and deletes it afterwards.

#![cfg(feature = "jobs-redis")]

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::sleep;
use writespace_jobs::{
    Backoff, ChannelObserver, FailOutcome, JobData, JobEvent, JobHandler, JobKind, JobOptions,
    JobQueue, JobState, JobsError, RedisJobQueue, Result, WorkerPool,
};

const QUEUE: &str = "email-queue";

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}

/// A key prefix no other test run shares
struct TestPrefix(String);

impl TestPrefix {
    fn new() -> Self {
        Self(format!("writespace-test-{}", uuid::Uuid::new_v4()))
    }

    fn queue(&self) -> RedisJobQueue {
        RedisJobQueue::new(&redis_url(), None, &self.0, QUEUE).unwrap()
    }

    async fn cleanup(self) {
        let client = redis::Client::open(redis_url()).unwrap();
        let mut conn = client.get_multiplexed_async_connection().await.unwrap();
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(format!("{}:*", self.0))
            .query_async(&mut conn)
            .await
            .unwrap();
        if !keys.is_empty() {
            redis::cmd("DEL").arg(keys).query_async::<()>(&mut conn).await.unwrap();
        }
    }
}

fn job(n: u32, options: JobOptions) -> JobData {
    JobData::new(QUEUE, JobKind::SendEmail.as_str(), json!({ "n": n }), options)
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_claims_in_enqueue_order() {
    let prefix = TestPrefix::new();
    let queue = prefix.queue();

    let mut ids = Vec::new();
    for n in 0..3 {
        ids.push(queue.enqueue(job(n, JobOptions::default())).await.unwrap().id);
    }

    for id in &ids {
        let claimed = queue.claim().await.unwrap().unwrap();
        assert_eq!(&claimed.job_id, id);
        assert_eq!(claimed.attempt(), 1);
        assert_eq!(claimed.state, JobState::Active);
    }
    assert!(queue.claim().await.unwrap().is_none());
    assert_eq!(queue.counts().await.unwrap().active, 3);

    prefix.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_competing_queues_never_share_a_job() {
    let prefix = TestPrefix::new();
    let producer = prefix.queue();
    for n in 0..20 {
        producer.enqueue(job(n, JobOptions::default())).await.unwrap();
    }

    let consumers: Vec<RedisJobQueue> = (0..4).map(|_| prefix.queue()).collect();
    let mut handles = Vec::new();
    for consumer in consumers {
        handles.push(tokio::spawn(async move {
            let mut claimed = Vec::new();
            while let Some(job) = consumer.claim().await.unwrap() {
                claimed.push(job.job_id);
            }
            claimed
        }));
    }

    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.await.unwrap());
    }
    let total = all.len();
    all.sort();
    all.dedup();
    assert_eq!(total, 20);
    assert_eq!(all.len(), 20);

    prefix.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_failed_attempt_is_delayed_by_backoff() {
    let prefix = TestPrefix::new();
    let queue = prefix.queue();
    let handle = queue
        .enqueue(job(0, JobOptions::new(3, Backoff::fixed(300))))
        .await
        .unwrap();
    queue.claim().await.unwrap().unwrap();

    assert_eq!(
        queue.fail(&handle.id, "boom").await.unwrap(),
        FailOutcome::Retrying {
            attempt: 1,
            delay: Duration::from_millis(300)
        }
    );
    assert!(queue.claim().await.unwrap().is_none());
    assert_eq!(queue.counts().await.unwrap().pending, 1);

    sleep(Duration::from_millis(450)).await;
    let retried = queue.claim().await.unwrap().unwrap();
    assert_eq!(retried.job_id, handle.id);
    assert_eq!(retried.attempt(), 2);
    assert_eq!(retried.last_error.as_deref(), Some("boom"));

    prefix.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_attempts_never_exceed_max() {
    let prefix = TestPrefix::new();
    let queue = prefix.queue();
    let handle = queue
        .enqueue(job(0, JobOptions::new(2, Backoff::fixed(0))))
        .await
        .unwrap();

    queue.claim().await.unwrap().unwrap();
    assert!(!queue.fail(&handle.id, "first").await.unwrap().is_terminal());

    let second = queue.claim().await.unwrap().unwrap();
    assert_eq!(second.attempt(), 2);
    assert_eq!(
        queue.fail(&handle.id, "second").await.unwrap(),
        FailOutcome::Failed { attempts: 2 }
    );

    assert!(queue.claim().await.unwrap().is_none());
    let stored = queue.get(&handle.id).await.unwrap().unwrap();
    assert_eq!(stored.state, JobState::Failed);
    assert_eq!(stored.attempts_made, 2);
    assert_eq!(stored.last_error.as_deref(), Some("second"));
    assert_eq!(queue.counts().await.unwrap().failed, 1);

    prefix.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_completion_discards_or_retains() {
    let prefix = TestPrefix::new();
    let queue = prefix.queue();

    let discarded = queue.enqueue(job(0, JobOptions::default())).await.unwrap();
    queue.claim().await.unwrap();
    queue.complete(&discarded.id).await.unwrap();
    assert!(queue.get(&discarded.id).await.unwrap().is_none());

    let kept = queue
        .enqueue(job(1, JobOptions::default().remove_on_complete(false)))
        .await
        .unwrap();
    queue.claim().await.unwrap();
    queue.complete(&kept.id).await.unwrap();
    let stored = queue.get(&kept.id).await.unwrap().unwrap();
    assert_eq!(stored.state, JobState::Completed);
    assert!(stored.finished_at.is_some());

    let counts = queue.counts().await.unwrap();
    assert_eq!(counts.active, 0);
    assert_eq!(counts.completed, 1);

    // A second completion finds nothing leased
    assert!(queue.complete(&kept.id).await.is_err());

    prefix.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_failed_job_discarded_when_configured() {
    let prefix = TestPrefix::new();
    let queue = prefix.queue();
    let handle = queue
        .enqueue(job(0, JobOptions::new(1, Backoff::fixed(0)).remove_on_fail(true)))
        .await
        .unwrap();
    queue.claim().await.unwrap();

    assert!(queue.fail(&handle.id, "boom").await.unwrap().is_terminal());
    assert!(queue.get(&handle.id).await.unwrap().is_none());
    assert_eq!(queue.counts().await.unwrap().failed, 0);

    prefix.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_history_is_trimmed_with_payloads() {
    let prefix = TestPrefix::new();
    let queue = prefix.queue().with_history_limit(2);

    let mut completed = Vec::new();
    for n in 0..3 {
        let handle = queue
            .enqueue(job(n, JobOptions::default().remove_on_complete(false)))
            .await
            .unwrap();
        queue.claim().await.unwrap();
        queue.complete(&handle.id).await.unwrap();
        completed.push(handle.id);
    }

    let mut failed = Vec::new();
    for n in 0..3 {
        let handle = queue
            .enqueue(job(n, JobOptions::new(1, Backoff::fixed(0))))
            .await
            .unwrap();
        queue.claim().await.unwrap();
        queue.fail(&handle.id, "boom").await.unwrap();
        failed.push(handle.id);
    }

    let counts = queue.counts().await.unwrap();
    assert_eq!(counts.completed, 2);
    assert_eq!(counts.failed, 2);
    assert!(queue.get(&completed[0]).await.unwrap().is_none());
    assert!(queue.get(&completed[2]).await.unwrap().is_some());
    assert!(queue.get(&failed[0]).await.unwrap().is_none());
    assert!(queue.get(&failed[2]).await.unwrap().is_some());

    prefix.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_expired_lease_is_recovered_as_new_attempt() {
    let prefix = TestPrefix::new();
    let crashed = prefix.queue().with_lease(Duration::from_millis(200));
    let survivor = prefix.queue().with_lease(Duration::from_millis(200));

    let handle = crashed
        .enqueue(job(0, JobOptions::new(3, Backoff::fixed(0))))
        .await
        .unwrap();
    assert_eq!(crashed.claim().await.unwrap().unwrap().attempt(), 1);

    // Nobody renews the lease
    assert!(survivor.claim().await.unwrap().is_none());
    sleep(Duration::from_millis(400)).await;

    let recovered = survivor.claim().await.unwrap().unwrap();
    assert_eq!(recovered.job_id, handle.id);
    assert_eq!(recovered.attempt(), 2);

    survivor.complete(&handle.id).await.unwrap();
    // The stalled worker's late outcome finds the job gone
    assert!(crashed.complete(&handle.id).await.is_err());
    assert_eq!(survivor.counts().await.unwrap().active, 0);

    prefix.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_stalled_last_attempt_is_parked_as_failed() {
    let prefix = TestPrefix::new();
    let queue = prefix.queue().with_lease(Duration::from_millis(100));
    let handle = queue
        .enqueue(job(0, JobOptions::new(1, Backoff::fixed(0))))
        .await
        .unwrap();
    queue.claim().await.unwrap().unwrap();

    sleep(Duration::from_millis(300)).await;
    assert!(queue.claim().await.unwrap().is_none());

    let counts = queue.counts().await.unwrap();
    assert_eq!(counts.active, 0);
    assert_eq!(counts.pending, 0);
    assert_eq!(counts.failed, 1);

    let stored = queue.get(&handle.id).await.unwrap().unwrap();
    assert_eq!(stored.state, JobState::Failed);
    assert_eq!(stored.attempts_made, 1);
    assert!(stored.last_error.unwrap().contains("lease"));

    prefix.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_renewed_lease_is_not_recovered() {
    let prefix = TestPrefix::new();
    let worker = prefix.queue().with_lease(Duration::from_millis(300));
    let other = prefix.queue().with_lease(Duration::from_millis(300));
    let handle = worker.enqueue(job(0, JobOptions::default())).await.unwrap();
    worker.claim().await.unwrap().unwrap();

    for _ in 0..4 {
        sleep(Duration::from_millis(150)).await;
        worker.renew(&handle.id).await.unwrap();
        assert!(other.claim().await.unwrap().is_none());
    }

    worker.complete(&handle.id).await.unwrap();
    assert!(worker.renew(&handle.id).await.is_err());

    prefix.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_zero_attempts_is_rejected() {
    let prefix = TestPrefix::new();
    let queue = prefix.queue();
    let options = JobOptions {
        max_attempts: 0,
        ..JobOptions::default()
    };

    let err = queue.enqueue(job(0, options)).await.unwrap_err();
    assert!(matches!(err, JobsError::Validation(_)));
    assert_eq!(queue.counts().await.unwrap().pending, 0);

    prefix.cleanup().await;
}

struct FailOnceHandler {
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl JobHandler for FailOnceHandler {
    type Payload = serde_json::Value;
    const KIND: JobKind = JobKind::SendEmail;

    async fn handle(&self, _job: &JobData, _payload: serde_json::Value) -> Result<()> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(JobsError::handler("first attempt fails"));
        }
        Ok(())
    }
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_worker_pool_retries_through_redis() {
    let prefix = TestPrefix::new();
    let queue: Arc<dyn JobQueue> = Arc::new(prefix.queue().with_lease(Duration::from_secs(5)));
    let calls = Arc::new(AtomicU32::new(0));
    let (observer, mut events) = ChannelObserver::new();

    let pool = WorkerPool::builder(queue.clone(), FailOnceHandler { calls: calls.clone() })
        .poll_interval(Duration::from_millis(20))
        .observer(Arc::new(observer))
        .start();

    let handle = queue
        .enqueue(job(0, JobOptions::new(2, Backoff::fixed(50))))
        .await
        .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        event,
        JobEvent::Completed {
            queue: QUEUE.to_string(),
            job_id: handle.id,
        }
    );
    pool.close().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    prefix.cleanup().await;
}
