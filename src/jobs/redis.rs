//! Redis-backed job queue implementation
//!
//! This implementation uses Redis lists, hashes and sorted sets for durable,
//! distributed job processing. Multiple processes can compete for jobs from the
//! same queue. Every state transition runs as a single Lua script, so a job id
//! is always held by exactly one of the pending list, the delayed set, the
//! active lease set or a history list, even if a process dies mid-operation.
//!
//! Claims are leased. A worker that stops renewing its lease (crash, lost
//! connection, killed container) leaves the job to be recovered by the next
//! claim on the queue, which puts it back in line and counts the lost run as
//! an attempt.

use crate::error::{JobsError, Result};
use crate::jobs::in_memory::DEFAULT_MAX_HISTORY_SIZE;
use crate::jobs::options::visible_after;
use crate::traits::job::{FailOutcome, JobCounts, JobData, JobHandle, JobQueue, JobState};
use async_trait::async_trait;
use chrono::Utc;
use redis::IntoConnectionInfo;
use redis::aio::MultiplexedConnection;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Maximum number of delayed or stalled jobs moved back to pending per claim
const SWEEP_BATCH_SIZE: usize = 100;

/// Default time a claim stays valid without a heartbeat
const DEFAULT_LEASE: Duration = Duration::from_secs(30);

/// Shared by the scripts that append to a history list
///
/// Keeps the newest `limit` ids and drops the payload and attempt counter of
/// everything evicted.
const TRIM_HISTORY: &str = r#"
local function trim_history(list, jobs, attempts, limit)
  local evicted = redis.call('LRANGE', list, limit, -1)
  if #evicted == 0 then
    return
  end
  redis.call('LTRIM', list, 0, limit - 1)
  for _, id in ipairs(evicted) do
    redis.call('HDEL', jobs, id)
    redis.call('HDEL', attempts, id)
  end
end
"#;

/// KEYS: delayed, pending, active, jobs, attempts, failed
/// ARGV: now ms, sweep batch, lease deadline ms, history limit
///
/// Reply: status, promoted, recovered, then id, payload and attempt count
/// where the status carries a job.
const CLAIM_SCRIPT: &str = r#"
local now = ARGV[1]
local due = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', now, 'LIMIT', 0, ARGV[2])
for _, id in ipairs(due) do
  redis.call('ZREM', KEYS[1], id)
  redis.call('LPUSH', KEYS[2], id)
end

-- Expired leases go to the consuming end of the list, ahead of new work
local stalled = redis.call('ZRANGEBYSCORE', KEYS[3], '-inf', now, 'LIMIT', 0, ARGV[2])
for _, id in ipairs(stalled) do
  redis.call('ZREM', KEYS[3], id)
  redis.call('RPUSH', KEYS[2], id)
end

local promoted = tostring(#due)
local recovered = tostring(#stalled)

local id = redis.call('RPOP', KEYS[2])
if not id then
  return {'empty', promoted, recovered}
end

local payload = redis.call('HGET', KEYS[4], id)
if not payload then
  redis.call('HDEL', KEYS[5], id)
  return {'missing', promoted, recovered, id}
end

local ok, job = pcall(cjson.decode, payload)
if not ok or type(job) ~= 'table' or type(job.options) ~= 'table' then
  redis.call('LPUSH', KEYS[6], id)
  trim_history(KEYS[6], KEYS[4], KEYS[5], tonumber(ARGV[4]))
  return {'corrupt', promoted, recovered, id}
end

local max_attempts = tonumber(job.options.max_attempts) or 1
local made = tonumber(redis.call('HGET', KEYS[5], id)) or 0
if made >= max_attempts then
  redis.call('LPUSH', KEYS[6], id)
  trim_history(KEYS[6], KEYS[4], KEYS[5], tonumber(ARGV[4]))
  return {'exhausted', promoted, recovered, id, payload, tostring(made)}
end

made = redis.call('HINCRBY', KEYS[5], id, 1)
redis.call('ZADD', KEYS[3], ARGV[3], id)
return {'claimed', promoted, recovered, id, payload, tostring(made)}
"#;

/// KEYS: active, jobs, attempts, completed
/// ARGV: id, payload to retain (empty to discard), history limit
const COMPLETE_SCRIPT: &str = r#"
if redis.call('ZREM', KEYS[1], ARGV[1]) == 0 then
  return 0
end
if ARGV[2] == '' then
  redis.call('HDEL', KEYS[2], ARGV[1])
  redis.call('HDEL', KEYS[3], ARGV[1])
else
  redis.call('HSET', KEYS[2], ARGV[1], ARGV[2])
  redis.call('LPUSH', KEYS[4], ARGV[1])
  trim_history(KEYS[4], KEYS[2], KEYS[3], tonumber(ARGV[3]))
end
return 1
"#;

/// KEYS: active, jobs, attempts, delayed, failed
/// ARGV: id, mode (retry | discard | retain), payload, retry at ms, history limit
const FAIL_SCRIPT: &str = r#"
if redis.call('ZREM', KEYS[1], ARGV[1]) == 0 then
  return 0
end
local mode = ARGV[2]
if mode == 'retry' then
  redis.call('HSET', KEYS[2], ARGV[1], ARGV[3])
  redis.call('ZADD', KEYS[4], ARGV[4], ARGV[1])
elseif mode == 'discard' then
  redis.call('HDEL', KEYS[2], ARGV[1])
  redis.call('HDEL', KEYS[3], ARGV[1])
else
  redis.call('HSET', KEYS[2], ARGV[1], ARGV[3])
  redis.call('LPUSH', KEYS[5], ARGV[1])
  trim_history(KEYS[5], KEYS[2], KEYS[3], tonumber(ARGV[5]))
end
return 1
"#;

/// KEYS: active. ARGV: id, new deadline ms
const RENEW_SCRIPT: &str = r#"
if not redis.call('ZSCORE', KEYS[1], ARGV[1]) then
  return 0
end
redis.call('ZADD', KEYS[1], ARGV[2], ARGV[1])
return 1
"#;

/// KEYS: jobs. ARGV: id, payload. Never recreates an evicted job.
const REWRITE_SCRIPT: &str = r#"
if redis.call('HEXISTS', KEYS[1], ARGV[1]) == 0 then
  return 0
end
redis.call('HSET', KEYS[1], ARGV[1], ARGV[2])
return 1
"#;

/// Redis keys used by one queue
#[derive(Debug, Clone)]
struct QueueKeys {
    jobs: String,
    attempts: String,
    pending: String,
    active: String,
    delayed: String,
    completed: String,
    failed: String,
}

impl QueueKeys {
    fn new(prefix: &str, queue: &str) -> Self {
        let base = format!("{}:{}", prefix, queue);
        Self {
            jobs: format!("{}:jobs", base),
            attempts: format!("{}:attempts", base),
            pending: format!("{}:pending", base),
            active: format!("{}:active", base),
            delayed: format!("{}:delayed", base),
            completed: format!("{}:completed", base),
            failed: format!("{}:failed", base),
        }
    }
}

struct Scripts {
    claim: redis::Script,
    complete: redis::Script,
    fail: redis::Script,
    renew: redis::Script,
    rewrite: redis::Script,
}

impl Scripts {
    fn load() -> Self {
        Self {
            claim: redis::Script::new(&format!("{}{}", TRIM_HISTORY, CLAIM_SCRIPT)),
            complete: redis::Script::new(&format!("{}{}", TRIM_HISTORY, COMPLETE_SCRIPT)),
            fail: redis::Script::new(&format!("{}{}", TRIM_HISTORY, FAIL_SCRIPT)),
            renew: redis::Script::new(RENEW_SCRIPT),
            rewrite: redis::Script::new(REWRITE_SCRIPT),
        }
    }
}

/// Result of one claim script run
#[derive(Debug, PartialEq)]
struct ClaimReply {
    promoted: usize,
    recovered: usize,
    outcome: ClaimOutcome,
}

#[derive(Debug, PartialEq)]
enum ClaimOutcome {
    Empty,
    Claimed { job_id: String, payload: String, attempts: u32 },
    /// The id had no payload and was dropped
    Missing { job_id: String },
    /// The payload could not be decoded and the id was parked as failed
    Corrupt { job_id: String },
    /// A recovered job had no attempts left and was parked as failed
    Exhausted { job_id: String, payload: String, attempts: u32 },
}

impl ClaimReply {
    fn parse(reply: Vec<String>) -> Result<Self> {
        let mut fields = reply.into_iter();
        let mut next = |what: &str| {
            fields
                .next()
                .ok_or_else(|| JobsError::store(format!("Malformed claim reply: missing {}", what)))
        };

        let status = next("status")?;
        let promoted = parse_field(&next("promoted count")?)?;
        let recovered = parse_field(&next("recovered count")?)?;

        let outcome = match status.as_str() {
            "empty" => ClaimOutcome::Empty,
            "missing" => ClaimOutcome::Missing { job_id: next("job id")? },
            "corrupt" => ClaimOutcome::Corrupt { job_id: next("job id")? },
            "claimed" | "exhausted" => {
                let job_id = next("job id")?;
                let payload = next("payload")?;
                let attempts = parse_field(&next("attempts")?)?;
                if status == "claimed" {
                    ClaimOutcome::Claimed { job_id, payload, attempts }
                } else {
                    ClaimOutcome::Exhausted { job_id, payload, attempts }
                }
            }
            other => {
                return Err(JobsError::store(format!("Unknown claim status: {}", other)));
            }
        };

        Ok(Self {
            promoted,
            recovered,
            outcome,
        })
    }
}

fn parse_field<T: FromStr>(raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| JobsError::store(format!("Malformed claim reply field: {}", raw)))
}

fn decode(job_id: &str, payload: &str) -> Result<JobData> {
    serde_json::from_str::<JobData>(payload)
        .map_err(|e| JobsError::serialization(format!("Failed to deserialize job {}: {}", job_id, e)))
}

/// Redis-backed job queue implementation
///
/// Uses Redis data structures (all prefixed with `{prefix}:{queue}`):
/// - `:jobs` - Hash of job id to serialized [`JobData`]
/// - `:attempts` - Hash of job id to attempts started (authoritative over the payload)
/// - `:pending` - List of job ids ready to be processed (FIFO)
/// - `:active` - Sorted set of claimed job ids (score = lease deadline in ms)
/// - `:delayed` - Sorted set of job ids waiting out a retry backoff (score = ready time in ms)
/// - `:completed` / `:failed` - Lists of retained terminal job ids, newest first,
///   capped at the history limit
///
/// Enqueue writes the hash entries and the list entry in one `MULTI`/`EXEC`, so a
/// job id is never visible without its payload.
#[derive(Clone)]
pub struct RedisJobQueue {
    name: String,
    client: redis::Client,
    keys: QueueKeys,
    scripts: Arc<Scripts>,
    lease: Duration,
    history_limit: usize,
    /// Lazily opened connection shared by all operations
    connection: Arc<tokio::sync::Mutex<Option<MultiplexedConnection>>>,
    /// Cached health status (updated by ping and connection attempts)
    health_status: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl RedisJobQueue {
    /// Create a new Redis job queue
    ///
    /// # Arguments
    ///
    /// * `url` - Redis connection URL (e.g., "redis://127.0.0.1:6379")
    /// * `password` - Optional password overriding the one in the URL
    /// * `prefix` - Key prefix shared by all queues of the application
    /// * `name` - Queue name (e.g., "email-queue")
    pub fn new(url: &str, password: Option<&str>, prefix: &str, name: &str) -> Result<Self> {
        let mut info = url
            .into_connection_info()
            .map_err(|e| JobsError::store(format!("Invalid Redis URL: {}", e)))?;
        if let Some(password) = password {
            info.redis.password = Some(password.to_string());
        }

        let client = redis::Client::open(info)
            .map_err(|e| JobsError::store(format!("Failed to create Redis client: {}", e)))?;

        Ok(Self::from_client(client, prefix, name))
    }

    /// Create a queue on top of an existing client
    pub fn from_client(client: redis::Client, prefix: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            client,
            keys: QueueKeys::new(prefix, name),
            scripts: Arc::new(Scripts::load()),
            lease: DEFAULT_LEASE,
            history_limit: DEFAULT_MAX_HISTORY_SIZE,
            connection: Arc::new(tokio::sync::Mutex::new(None)),
            health_status: Arc::new(AtomicBool::new(true)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// How long a claim survives without a heartbeat (at least one millisecond)
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease.max(Duration::from_millis(1));
        self
    }

    /// Cap on retained completed jobs, and separately on retained failed jobs
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    /// Ping Redis and update health status
    ///
    /// The synchronous `is_healthy()` trait method returns the cached status from the
    /// last ping or connection attempt.
    pub async fn ping(&self) -> bool {
        match self.get_connection().await {
            Ok(mut conn) => {
                let result: redis::RedisResult<String> =
                    redis::cmd("PING").query_async(&mut conn).await;
                let healthy = result.is_ok();
                self.health_status.store(healthy, Ordering::Release);
                healthy
            }
            Err(e) => {
                tracing::warn!(queue = %self.name, error = %e, "Redis job queue ping failed");
                false
            }
        }
    }

    /// Get the shared Redis connection, opening it on first use
    async fn get_connection(&self) -> Result<MultiplexedConnection> {
        if self.closed.load(Ordering::Acquire) {
            return Err(JobsError::store(format!("Queue {} is closed", self.name)));
        }

        let mut guard = self.connection.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                self.health_status.store(false, Ordering::Release);
                JobsError::store(format!("Failed to get Redis connection: {}", e))
            })?;
        self.health_status.store(true, Ordering::Release);
        *guard = Some(conn.clone());
        Ok(conn)
    }

    fn lease_deadline_ms(&self) -> i64 {
        visible_after(Utc::now(), self.lease).timestamp_millis()
    }

    /// Read a job with its attempt counter and lease applied
    async fn load(&self, conn: &mut MultiplexedConnection, job_id: &str) -> Result<Option<JobData>> {
        let (payload, attempts, lease): (Option<String>, Option<u32>, Option<f64>) = redis::pipe()
            .cmd("HGET").arg(&self.keys.jobs).arg(job_id)
            .cmd("HGET").arg(&self.keys.attempts).arg(job_id)
            .cmd("ZSCORE").arg(&self.keys.active).arg(job_id)
            .query_async(conn)
            .await
            .map_err(|e| JobsError::store(format!("Failed to load job: {}", e)))?;

        let Some(payload) = payload else {
            return Ok(None);
        };
        let mut job = decode(job_id, &payload)?;
        if let Some(attempts) = attempts {
            job.attempts_made = attempts;
        }
        if lease.is_some() {
            job.state = JobState::Active;
            job.available_at = None;
        }
        Ok(Some(job))
    }

    /// Run the fail script; false means the job was no longer leased
    async fn record_failure(
        &self,
        conn: &mut MultiplexedConnection,
        job_id: &str,
        mode: &str,
        payload: &str,
        retry_at_ms: i64,
    ) -> Result<bool> {
        let applied: i64 = self
            .scripts
            .fail
            .key(&self.keys.active)
            .key(&self.keys.jobs)
            .key(&self.keys.attempts)
            .key(&self.keys.delayed)
            .key(&self.keys.failed)
            .arg(job_id)
            .arg(mode)
            .arg(payload)
            .arg(retry_at_ms)
            .arg(self.history_limit)
            .invoke_async(conn)
            .await
            .map_err(|e| JobsError::store(format!("Failed to record job failure: {}", e)))?;
        Ok(applied == 1)
    }

    /// Mark a recovered job that ran out of attempts as failed in its payload
    ///
    /// The claim script already moved its id to the failed list; this only
    /// brings the stored record in line and is skipped if the job was evicted.
    async fn settle_exhausted(
        &self,
        conn: &mut MultiplexedConnection,
        job_id: &str,
        payload: &str,
        attempts: u32,
    ) -> Result<()> {
        let mut job = decode(job_id, payload)?;
        job.attempts_made = attempts;
        job.state = JobState::Failed;
        job.available_at = None;
        job.finished_at = Some(Utc::now());
        if job.last_error.is_none() {
            job.last_error = Some("Job lease expired on its last attempt".to_string());
        }

        self.scripts
            .rewrite
            .key(&self.keys.jobs)
            .arg(job_id)
            .arg(serde_json::to_string(&job)?)
            .invoke_async::<i64>(conn)
            .await
            .map_err(|e| JobsError::store(format!("Failed to update exhausted job: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn enqueue(&self, mut job: JobData) -> Result<JobHandle> {
        job.options.validate()?;
        job.queue = self.name.clone();
        job.state = JobState::Pending;

        let job_json = serde_json::to_string(&job)
            .map_err(|e| JobsError::serialization(format!("Failed to serialize job: {}", e)))?;

        let mut conn = self.get_connection().await?;
        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.cmd("HSET").arg(&self.keys.jobs).arg(&job.job_id).arg(&job_json).ignore();
        pipe.cmd("HSET")
            .arg(&self.keys.attempts)
            .arg(&job.job_id)
            .arg(job.attempts_made)
            .ignore();
        match job.available_at {
            Some(at) if at > Utc::now() => {
                pipe.cmd("ZADD")
                    .arg(&self.keys.delayed)
                    .arg(at.timestamp_millis())
                    .arg(&job.job_id)
                    .ignore();
            }
            _ => {
                pipe.cmd("LPUSH").arg(&self.keys.pending).arg(&job.job_id).ignore();
            }
        }
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(|e| JobsError::store(format!("Failed to enqueue job: {}", e)))?;

        Ok(JobHandle {
            id: job.job_id,
            queue: self.name.clone(),
        })
    }

    async fn claim(&self) -> Result<Option<JobData>> {
        let mut conn = self.get_connection().await?;

        loop {
            let raw: Vec<String> = self
                .scripts
                .claim
                .key(&self.keys.delayed)
                .key(&self.keys.pending)
                .key(&self.keys.active)
                .key(&self.keys.jobs)
                .key(&self.keys.attempts)
                .key(&self.keys.failed)
                .arg(Utc::now().timestamp_millis())
                .arg(SWEEP_BATCH_SIZE)
                .arg(self.lease_deadline_ms())
                .arg(self.history_limit)
                .invoke_async(&mut conn)
                .await
                .map_err(|e| JobsError::store(format!("Failed to claim job: {}", e)))?;
            let reply = ClaimReply::parse(raw)?;

            if reply.promoted > 0 {
                tracing::debug!(queue = %self.name, promoted = reply.promoted, "Promoted delayed jobs");
            }
            if reply.recovered > 0 {
                tracing::warn!(queue = %self.name, recovered = reply.recovered, "Recovered stalled jobs with expired leases");
            }

            match reply.outcome {
                ClaimOutcome::Empty => return Ok(None),
                ClaimOutcome::Missing { job_id } => {
                    tracing::warn!(queue = %self.name, job_id = %job_id, "Claimed job has no payload, dropping");
                }
                ClaimOutcome::Corrupt { job_id } => {
                    tracing::error!(queue = %self.name, job_id = %job_id, "Claimed job is unreadable, parked as failed");
                }
                ClaimOutcome::Exhausted { job_id, payload, attempts } => {
                    tracing::error!(queue = %self.name, job_id = %job_id, attempts, "Stalled job has no attempts left, parked as failed");
                    if let Err(e) = self.settle_exhausted(&mut conn, &job_id, &payload, attempts).await {
                        tracing::warn!(queue = %self.name, job_id = %job_id, error = %e, "Failed to update exhausted job");
                    }
                }
                ClaimOutcome::Claimed { job_id, payload, attempts } => {
                    let mut job = match decode(&job_id, &payload) {
                        Ok(job) => job,
                        Err(e) => {
                            tracing::error!(queue = %self.name, job_id = %job_id, error = %e, "Claimed job is unreadable, parking as failed");
                            self.record_failure(&mut conn, &job_id, "retain", &payload, 0).await?;
                            continue;
                        }
                    };
                    job.attempts_made = attempts;
                    job.state = JobState::Active;
                    job.available_at = None;
                    return Ok(Some(job));
                }
            }
        }
    }

    async fn complete(&self, job_id: &str) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let retained = match self.load(&mut conn, job_id).await? {
            Some(mut job) if !job.options.remove_on_complete => {
                job.state = JobState::Completed;
                job.finished_at = Some(Utc::now());
                serde_json::to_string(&job)?
            }
            _ => String::new(),
        };

        let applied: i64 = self
            .scripts
            .complete
            .key(&self.keys.active)
            .key(&self.keys.jobs)
            .key(&self.keys.attempts)
            .key(&self.keys.completed)
            .arg(job_id)
            .arg(retained)
            .arg(self.history_limit)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| JobsError::store(format!("Failed to complete job: {}", e)))?;

        if applied == 0 {
            return Err(JobsError::internal(format!(
                "Job {} is not active on queue {}",
                job_id, self.name
            )));
        }
        Ok(())
    }

    async fn fail(&self, job_id: &str, error: &str) -> Result<FailOutcome> {
        let mut conn = self.get_connection().await?;
        let mut job = self
            .load(&mut conn, job_id)
            .await?
            .ok_or_else(|| JobsError::internal(format!("Job {} missing from queue {}", job_id, self.name)))?;
        job.last_error = Some(error.to_string());

        let (mode, retry_at_ms, outcome) = if job.should_retry() {
            let attempt = job.attempts_made;
            let delay = job.options.backoff.delay_for(attempt);
            let retry_at = visible_after(Utc::now(), delay);

            job.state = JobState::Pending;
            job.available_at = Some(retry_at);
            ("retry", retry_at.timestamp_millis(), FailOutcome::Retrying { attempt, delay })
        } else {
            let attempts = job.attempts_made;
            job.state = JobState::Failed;
            job.finished_at = Some(Utc::now());
            let mode = if job.options.remove_on_fail { "discard" } else { "retain" };
            (mode, 0, FailOutcome::Failed { attempts })
        };

        let payload = serde_json::to_string(&job)?;
        if !self.record_failure(&mut conn, job_id, mode, &payload, retry_at_ms).await? {
            return Err(JobsError::internal(format!(
                "Job {} is not active on queue {}",
                job_id, self.name
            )));
        }
        Ok(outcome)
    }

    async fn get(&self, job_id: &str) -> Result<Option<JobData>> {
        let mut conn = self.get_connection().await?;
        self.load(&mut conn, job_id).await
    }

    async fn counts(&self) -> Result<JobCounts> {
        let mut conn = self.get_connection().await?;
        let (pending, delayed, active, completed, failed): (usize, usize, usize, usize, usize) =
            redis::pipe()
                .cmd("LLEN").arg(&self.keys.pending)
                .cmd("ZCARD").arg(&self.keys.delayed)
                .cmd("ZCARD").arg(&self.keys.active)
                .cmd("LLEN").arg(&self.keys.completed)
                .cmd("LLEN").arg(&self.keys.failed)
                .query_async(&mut conn)
                .await
                .map_err(|e| JobsError::store(format!("Failed to count jobs: {}", e)))?;

        Ok(JobCounts {
            pending: pending + delayed,
            active,
            completed,
            failed,
        })
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        // Dropping the last clone of the multiplexed connection closes the socket
        self.connection.lock().await.take();
        self.health_status.store(false, Ordering::Release);
        tracing::debug!(queue = %self.name, "Redis job queue connection released");
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        // Return cached health status from the last ping() or connection attempt
        !self.closed.load(Ordering::Acquire) && self.health_status.load(Ordering::Acquire)
    }

    fn lease(&self) -> Option<Duration> {
        Some(self.lease)
    }

    async fn renew(&self, job_id: &str) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let renewed: i64 = self
            .scripts
            .renew
            .key(&self.keys.active)
            .arg(job_id)
            .arg(self.lease_deadline_ms())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| JobsError::store(format!("Failed to renew job lease: {}", e)))?;

        if renewed == 0 {
            return Err(JobsError::internal(format!(
                "Lease on job {} was lost on queue {}",
                job_id, self.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobOptions;

    fn reply(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn test_queue_keys_layout() {
        let keys = QueueKeys::new("writespace", "email-queue");
        assert_eq!(keys.jobs, "writespace:email-queue:jobs");
        assert_eq!(keys.attempts, "writespace:email-queue:attempts");
        assert_eq!(keys.pending, "writespace:email-queue:pending");
        assert_eq!(keys.active, "writespace:email-queue:active");
        assert_eq!(keys.delayed, "writespace:email-queue:delayed");
        assert_eq!(keys.completed, "writespace:email-queue:completed");
        assert_eq!(keys.failed, "writespace:email-queue:failed");
    }

    #[test]
    fn test_parse_claim_replies() {
        assert_eq!(
            ClaimReply::parse(reply(&["empty", "2", "0"])).unwrap(),
            ClaimReply {
                promoted: 2,
                recovered: 0,
                outcome: ClaimOutcome::Empty
            }
        );

        let claimed = ClaimReply::parse(reply(&["claimed", "0", "1", "job-1", "{}", "2"])).unwrap();
        assert_eq!(claimed.recovered, 1);
        assert_eq!(
            claimed.outcome,
            ClaimOutcome::Claimed {
                job_id: "job-1".to_string(),
                payload: "{}".to_string(),
                attempts: 2
            }
        );

        assert_eq!(
            ClaimReply::parse(reply(&["missing", "0", "0", "job-2"])).unwrap().outcome,
            ClaimOutcome::Missing {
                job_id: "job-2".to_string()
            }
        );
        assert!(matches!(
            ClaimReply::parse(reply(&["exhausted", "0", "1", "job-3", "{}", "3"])).unwrap().outcome,
            ClaimOutcome::Exhausted { attempts: 3, .. }
        ));
    }

    #[test]
    fn test_parse_rejects_malformed_claim_replies() {
        assert!(ClaimReply::parse(Vec::new()).is_err());
        assert!(ClaimReply::parse(reply(&["claimed", "0", "0", "job-1"])).is_err());
        assert!(ClaimReply::parse(reply(&["claimed", "0", "0", "job-1", "{}", "two"])).is_err());
        assert!(ClaimReply::parse(reply(&["stolen", "0", "0"])).is_err());
    }

    #[test]
    fn test_scripts_share_history_trim() {
        for body in [CLAIM_SCRIPT, COMPLETE_SCRIPT, FAIL_SCRIPT] {
            assert!(body.contains("trim_history("));
        }
        assert!(TRIM_HISTORY.contains("LTRIM"));
        assert!(TRIM_HISTORY.contains("HDEL"));
    }

    #[test]
    fn test_new_rejects_invalid_url() {
        let result = RedisJobQueue::new("not a url", None, "writespace", "email-queue");
        assert!(matches!(result, Err(JobsError::Store(_))));
    }

    #[test]
    fn test_lease_and_history_limit_are_clamped() {
        let queue = RedisJobQueue::new("redis://127.0.0.1:6379", None, "writespace", "email-queue")
            .unwrap()
            .with_lease(Duration::ZERO)
            .with_history_limit(0);
        assert_eq!(queue.lease(), Some(Duration::from_millis(1)));
        assert_eq!(queue.history_limit, 1);
    }

    #[tokio::test]
    async fn test_enqueue_rejects_zero_attempts_before_connecting() {
        // Port 1 is never a Redis server; validation must fail first
        let queue = RedisJobQueue::new("redis://127.0.0.1:1", None, "writespace", "email-queue").unwrap();
        let options = JobOptions {
            max_attempts: 0,
            ..JobOptions::default()
        };
        let job = JobData::new("email-queue", "send-email", serde_json::json!({}), options);

        let err = queue.enqueue(job).await.unwrap_err();
        assert!(matches!(err, JobsError::Validation(_)));
    }

    #[tokio::test]
    async fn test_operations_fail_after_close() {
        // No server needed: close() never touches the network
        let queue = RedisJobQueue::new("redis://127.0.0.1:6379", Some("secret"), "writespace", "email-queue").unwrap();
        queue.close().await.unwrap();
        queue.close().await.unwrap();

        assert!(!queue.is_healthy());
        let job = JobData::new("email-queue", "send-email", serde_json::json!({}), Default::default());
        let err = queue.enqueue(job).await.unwrap_err();
        assert!(err.is_store_error());
        assert!(queue.renew("job-1").await.is_err());
    }
}
