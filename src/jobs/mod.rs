//! Background job system
//!
//! Named queues with at-least-once delivery, per-job retry and retention
//! options, and worker pools that run one typed handler per queue with bounded
//! concurrency. Queues are backed by memory or by Redis.

mod config;
mod events;
mod handler;
mod in_memory;
mod options;
mod worker;

#[cfg(feature = "jobs-redis")]
mod redis;


pub use config::{JobBackend, JobsConfig};
pub use events::{ChannelObserver, JobEvent, JobObserver, LoggingObserver};
pub use handler::JobHandler;
pub use in_memory::InMemoryJobQueue;
pub use options::{Backoff, BackoffKind, JobOptions};
pub use worker::{WorkerPool, WorkerPoolBuilder};

#[cfg(feature = "jobs-redis")]
pub use redis::RedisJobQueue;
