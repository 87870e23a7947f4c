use crate::email::EmailConfig;
use crate::error::Result;
use crate::jobs::JobHandler;
use crate::queues::EmailJob;
use crate::traits::job::{JobData, JobKind};
use crate::traits::mailer::{Email, Mailer};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_OTP_STALE_AFTER: Duration = Duration::from_secs(60);

/// Delivers "send-email" jobs through a [`Mailer`]
///
/// OTP emails that waited in the queue longer than the staleness threshold are
/// skipped and reported as successful: the code inside has most likely expired
/// and the user has asked for a new one.
pub struct EmailDeliveryHandler {
    mailer: Arc<dyn Mailer>,
    from: String,
    otp_stale_after: Duration,
}

impl EmailDeliveryHandler {
    pub fn new(mailer: Arc<dyn Mailer>, from: impl Into<String>) -> Self {
        Self {
            mailer,
            from: from.into(),
            otp_stale_after: DEFAULT_OTP_STALE_AFTER,
        }
    }

    pub fn from_config(mailer: Arc<dyn Mailer>, config: &EmailConfig) -> Self {
        Self::new(mailer, config.from.clone()).with_otp_stale_after(config.otp_stale_after())
    }

    pub fn with_otp_stale_after(mut self, stale_after: Duration) -> Self {
        self.otp_stale_after = stale_after;
        self
    }

    fn is_stale(&self, job: &JobData, payload: &EmailJob) -> Option<Duration> {
        if !payload.is_otp() {
            return None;
        }
        let age = job.age();
        (age > self.otp_stale_after).then_some(age)
    }
}

#[async_trait]
impl JobHandler for EmailDeliveryHandler {
    type Payload = EmailJob;
    const KIND: JobKind = JobKind::SendEmail;

    async fn handle(&self, job: &JobData, payload: EmailJob) -> Result<()> {
        if let Some(age) = self.is_stale(job, &payload) {
            tracing::warn!(
                job_id = %job.job_id,
                age_secs = age.as_secs(),
                "Skipping stale OTP email job {} (age: {}s)",
                job.job_id,
                age.as_secs()
            );
            return Ok(());
        }

        tracing::info!(job_id = %job.job_id, attempt = job.attempt(), "Processing email job");

        let email = Email::new(self.from.clone(), payload.to, payload.subject).html(payload.html);
        self.mailer.send(&email).await
    }
}
