//! Typed job handlers
//!
//! A pool runs exactly one handler, and the handler declares the one job kind it
//! accepts. The pool deserializes the stored payload into `Payload` before
//! calling [`JobHandler::handle`].

use crate::error::Result;
use crate::traits::job::{JobData, JobKind};
use async_trait::async_trait;
use serde::de::DeserializeOwned;

/// Executes jobs of a single kind
///
/// # Example
///
/// ```rust,ignore
/// struct AuditHandler;
///
/// #[async_trait]
/// impl JobHandler for AuditHandler {
///     type Payload = InteractionJob;
///     const KIND: JobKind = JobKind::ProcessInteraction;
///
///     async fn handle(&self, job: &JobData, payload: InteractionJob) -> Result<()> {
///         tracing::info!(job_id = %job.job_id, attempt = job.attempt(), "Audit");
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    /// Payload type stored in the job
    type Payload: DeserializeOwned + Send + 'static;

    /// The job kind this handler accepts
    const KIND: JobKind;

    /// Run one attempt of a job
    ///
    /// `job` carries the metadata (id, enqueue time, attempt number). An `Err`
    /// (or a panic) counts as a failed attempt and goes through the job's retry
    /// policy.
    async fn handle(&self, job: &JobData, payload: Self::Payload) -> Result<()>;
}
