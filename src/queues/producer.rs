//! Producer API
//!
//! The only entry point request handlers use. Each call validates the payload,
//! durably enqueues it and returns without waiting for the job to run.

use super::payloads::{EmailJob, InteractionJob};
use crate::error::Result;
use crate::jobs::JobOptions;
use crate::traits::job::{Job, JobData, JobHandle, JobKind, JobQueue};
use std::sync::Arc;

/// Enqueues email and interaction jobs
#[derive(Clone)]
pub struct Producer {
    email_queue: Arc<dyn JobQueue>,
    interaction_queue: Arc<dyn JobQueue>,
}

impl Producer {
    pub fn new(email_queue: Arc<dyn JobQueue>, interaction_queue: Arc<dyn JobQueue>) -> Self {
        for (queue, kind) in [
            (&email_queue, JobKind::SendEmail),
            (&interaction_queue, JobKind::ProcessInteraction),
        ] {
            if queue.name() != kind.queue_name() {
                tracing::warn!(
                    queue = %queue.name(),
                    expected = kind.queue_name(),
                    "Producer queue name differs from the default for {} jobs",
                    kind
                );
            }
        }

        Self {
            email_queue,
            interaction_queue,
        }
    }

    pub fn email_queue(&self) -> &Arc<dyn JobQueue> {
        &self.email_queue
    }

    pub fn interaction_queue(&self) -> &Arc<dyn JobQueue> {
        &self.interaction_queue
    }

    /// Enqueue an email with 3 attempts and exponential backoff from 1s
    pub async fn add_email_job(&self, job: EmailJob) -> Result<JobHandle> {
        let options = job.default_options();
        self.add_email_job_with_options(job, options).await
    }

    pub async fn add_email_job_with_options(
        &self,
        job: EmailJob,
        options: JobOptions,
    ) -> Result<JobHandle> {
        job.validate()?;
        let handle = self.enqueue(&self.email_queue, &job, options).await?;
        tracing::debug!(job_id = %handle.id, queue = %handle.queue, "Email job enqueued");
        Ok(handle)
    }

    /// Enqueue an in-app notification with 2 attempts and fixed 1s backoff
    ///
    /// Returns `Ok(None)` without enqueueing when a user would be notified of
    /// their own like, comment, follow or share.
    pub async fn add_interaction_job(&self, job: InteractionJob) -> Result<Option<JobHandle>> {
        let options = job.default_options();
        self.add_interaction_job_with_options(job, options).await
    }

    pub async fn add_interaction_job_with_options(
        &self,
        job: InteractionJob,
        options: JobOptions,
    ) -> Result<Option<JobHandle>> {
        job.validate()?;

        if job.is_self_interaction() {
            tracing::debug!(
                notification_type = %job.notification_type,
                "Skipping self-notification"
            );
            return Ok(None);
        }

        let handle = self.enqueue(&self.interaction_queue, &job, options).await?;
        tracing::debug!(
            job_id = %handle.id,
            queue = %handle.queue,
            notification_type = %job.notification_type,
            "Interaction job enqueued"
        );
        Ok(Some(handle))
    }

    async fn enqueue(
        &self,
        queue: &Arc<dyn JobQueue>,
        job: &dyn Job,
        options: JobOptions,
    ) -> Result<JobHandle> {
        let data = JobData::from_job(job, options)?;
        queue.enqueue(data).await.inspect_err(|e| {
            tracing::error!(queue = %queue.name(), job_type = %job.kind(), error = %e, "Failed to enqueue job");
        })
    }
}

impl std::fmt::Debug for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer")
            .field("email_queue", &self.email_queue.name())
            .field("interaction_queue", &self.interaction_queue.name())
            .finish()
    }
}
