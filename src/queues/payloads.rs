use crate::error::{JobsError, Result};
use crate::jobs::{Backoff, JobOptions};
use crate::notifications::NotificationType;
use crate::traits::job::{Job, JobKind};
use serde::{Deserialize, Serialize};

/// Payload of a "send-email" job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailJob {
    pub to: String,
    pub subject: String,
    /// Complete rendered HTML document
    pub html: String,
}

impl EmailJob {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            html: html.into(),
        }
    }

    /// One-time-password emails are marked by "OTP" in the subject
    pub fn is_otp(&self) -> bool {
        self.subject.contains("OTP")
    }

    pub fn validate(&self) -> Result<()> {
        if self.to.trim().is_empty() {
            return Err(JobsError::validation("Email recipient is required"));
        }
        if self.subject.trim().is_empty() {
            return Err(JobsError::validation("Email subject is required"));
        }
        if self.html.trim().is_empty() {
            return Err(JobsError::validation("Email body is required"));
        }
        Ok(())
    }
}

impl Job for EmailJob {
    fn kind(&self) -> JobKind {
        JobKind::SendEmail
    }

    fn serialize(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// 3 attempts, exponential backoff from 1s
    fn default_options(&self) -> JobOptions {
        JobOptions::new(3, Backoff::exponential(1000))
    }
}

/// Payload of a "process-interaction" job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionJob {
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub recipient_id: String,
    /// Who performed the action, if anyone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    /// Post, comment or user the notification points at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_id: Option<String>,
    pub message: String,
}

impl InteractionJob {
    pub fn new(
        notification_type: NotificationType,
        recipient_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            notification_type,
            recipient_id: recipient_id.into(),
            actor_id: None,
            related_id: None,
            message: message.into(),
        }
    }

    pub fn actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    pub fn related(mut self, related_id: impl Into<String>) -> Self {
        self.related_id = Some(related_id.into());
        self
    }

    /// A social interaction the recipient performed on their own content
    pub fn is_self_interaction(&self) -> bool {
        self.notification_type.is_social()
            && self.actor_id.as_deref() == Some(self.recipient_id.as_str())
    }

    pub fn validate(&self) -> Result<()> {
        if self.recipient_id.trim().is_empty() {
            return Err(JobsError::validation("Notification recipient is required"));
        }
        Ok(())
    }
}

impl Job for InteractionJob {
    fn kind(&self) -> JobKind {
        JobKind::ProcessInteraction
    }

    fn serialize(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// 2 attempts, fixed 1s backoff
    fn default_options(&self) -> JobOptions {
        JobOptions::new(2, Backoff::fixed(1000))
    }
}
