use crate::error::Result;
use crate::jobs::JobHandler;
use crate::notifications::{NewNotification, NotificationStore};
use crate::queues::InteractionJob;
use crate::traits::job::{JobData, JobKind};
use async_trait::async_trait;
use std::sync::Arc;

/// Persists "process-interaction" jobs as in-app notifications
pub struct InteractionHandler {
    store: Arc<dyn NotificationStore>,
}

impl InteractionHandler {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl JobHandler for InteractionHandler {
    type Payload = InteractionJob;
    const KIND: JobKind = JobKind::ProcessInteraction;

    async fn handle(&self, job: &JobData, payload: InteractionJob) -> Result<()> {
        let notification = self
            .store
            .insert_notification(NewNotification {
                recipient_id: payload.recipient_id,
                notification_type: payload.notification_type,
                message: payload.message,
                related_id: payload.related_id,
            })
            .await?;

        tracing::debug!(
            job_id = %job.job_id,
            notification_id = notification.id,
            notification_type = %notification.notification_type,
            "Notification stored"
        );
        Ok(())
    }
}
