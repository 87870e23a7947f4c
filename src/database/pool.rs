use crate::database::DatabaseConfig;
use crate::error::{JobsError, Result};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// SeaORM connection pool
///
/// The stored URL is redacted so the pool can be logged without leaking
/// credentials. Cloning the inner connection shares the same sqlx pool.
pub struct DatabasePool {
    conn: DatabaseConnection,
    redacted_url: String,
    closed: AtomicBool,
}

impl DatabasePool {
    pub fn new(conn: DatabaseConnection, url: &str) -> Self {
        Self {
            conn,
            redacted_url: super::redact_database_url(url),
            closed: AtomicBool::new(false),
        }
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let mut opt = ConnectOptions::new(config.url.clone());
        opt.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .idle_timeout(Duration::from_secs(config.idle_timeout))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await.map_err(|e| {
            JobsError::store(format!(
                "Failed to connect to database {}: {}",
                config.redacted_url(),
                e
            ))
        })?;

        tracing::info!(
            url = %config.redacted_url(),
            max_connections = config.max_connections,
            "Database connected"
        );

        Ok(Self::new(conn, &config.url))
    }

    /// Handle to the pooled connection
    pub fn connection(&self) -> DatabaseConnection {
        self.conn.clone()
    }

    pub fn connection_url(&self) -> &str {
        &self.redacted_url
    }

    pub async fn ping(&self) -> Result<()> {
        self.conn.ping().await?;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close every connection of the pool; later calls are no-ops
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.conn.clone().close().await?;
        tracing::info!(url = %self.redacted_url, "Database pool closed");
        Ok(())
    }
}

impl std::fmt::Debug for DatabasePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabasePool")
            .field("url", &self.redacted_url)
            .field("closed", &self.is_closed())
            .finish()
    }
}
