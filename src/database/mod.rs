//! Postgres connection pool for the notification store
//!
//! Backed by SeaORM's sqlx pool; shared by every task of the interaction worker.

mod config;
mod pool;

pub use config::{DatabaseConfig, redact_database_url};
pub use pool::DatabasePool;
pub use sea_orm;
