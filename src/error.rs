/// The main error type for Writespace background jobs
#[derive(Debug, thiserror::Error)]
pub enum JobsError {
    /// The durable queue store could not be reached or rejected a command
    #[error("Queue store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// A job handler reported a failure (or panicked)
    #[error("Handler error: {0}")]
    Handler(String),

    /// The mail transport failed to deliver a message
    #[error("Mail transport error: {0}")]
    Transport(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl JobsError {
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn handler(msg: impl Into<String>) -> Self {
        Self::Handler(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the error came from the queue store itself rather than from job execution
    pub fn is_store_error(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

impl From<serde_json::Error> for JobsError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(feature = "jobs-redis")]
impl From<redis::RedisError> for JobsError {
    fn from(err: redis::RedisError) -> Self {
        Self::Store(err.to_string())
    }
}

#[cfg(feature = "database")]
impl From<sea_orm::DbErr> for JobsError {
    fn from(err: sea_orm::DbErr) -> Self {
        tracing::error!(error = %err, "Database error occurred");
        Self::Database(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, JobsError>;
