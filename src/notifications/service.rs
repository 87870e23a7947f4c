//! Account emails and in-app notifications
//!
//! Renders emails and builds notification messages, then hands them to the
//! [`Producer`]. Nothing here waits for delivery.

use super::config::NotificationsConfig;
use super::models::NotificationType;
use super::templates::EmailTemplates;
use crate::error::Result;
use crate::queues::{EmailJob, InteractionJob, Producer};
use crate::traits::job::JobHandle;
use chrono::Utc;

/// Subject of the account verification email; the "OTP" marker enables the staleness skip
pub const OTP_SUBJECT: &str = "Verify Your Account - OTP";

#[derive(Debug, Clone)]
pub struct NotificationService {
    producer: Producer,
    templates: EmailTemplates,
}

impl NotificationService {
    pub fn new(producer: Producer, templates: EmailTemplates) -> Self {
        Self {
            producer,
            templates,
        }
    }

    pub fn from_config(producer: Producer, config: &NotificationsConfig) -> Self {
        Self::new(
            producer,
            EmailTemplates::new(&config.client_url, &config.app_name),
        )
    }

    pub fn templates(&self) -> &EmailTemplates {
        &self.templates
    }

    // Email channel (account and security)

    /// Welcome email plus a WELCOME in-app notification
    pub async fn send_welcome_email(
        &self,
        to: &str,
        username: &str,
        user_id: &str,
    ) -> Result<JobHandle> {
        let app = self.templates.app_name();
        let html = self
            .templates
            .welcome(username, &self.templates.link("/onboarding"));
        let handle = self
            .producer
            .add_email_job(EmailJob::new(to, format!("Welcome to {}! 🚀", app), html))
            .await?;

        self.create_in_app_notification(InteractionJob::new(
            NotificationType::Welcome,
            user_id,
            format!("Welcome to {}, {}! We're glad you're here.", app, username),
        ))
        .await?;

        Ok(handle)
    }

    pub async fn send_password_reset_email(
        &self,
        to: &str,
        username: &str,
        reset_url: &str,
    ) -> Result<JobHandle> {
        let html = self.templates.password_reset(username, reset_url);
        self.producer
            .add_email_job(EmailJob::new(to, "Reset Your Password", html))
            .await
    }

    pub async fn send_login_alert(
        &self,
        to: &str,
        username: &str,
        ip: &str,
        device: Option<&str>,
    ) -> Result<JobHandle> {
        let time = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
        let html = self.templates.login_alert(
            username,
            &time,
            ip,
            device,
            &self.templates.link("/settings/security"),
        );
        self.producer
            .add_email_job(EmailJob::new(to, "New Login Detected ⚠️", html))
            .await
    }

    pub async fn send_password_update_email(&self, to: &str, username: &str) -> Result<JobHandle> {
        let html = self
            .templates
            .password_update(username, &self.templates.link("/contact"));
        self.producer
            .add_email_job(EmailJob::new(to, "Password Updated Successfully", html))
            .await
    }

    pub async fn send_profile_update_email(&self, to: &str, username: &str) -> Result<JobHandle> {
        let html = self
            .templates
            .profile_update(username, &self.templates.link("/profile"));
        self.producer
            .add_email_job(EmailJob::new(to, "Profile Information Updated", html))
            .await
    }

    pub async fn send_otp_email(&self, to: &str, otp: &str) -> Result<JobHandle> {
        let html = self.templates.otp_verify(otp);
        self.producer
            .add_email_job(EmailJob::new(to, OTP_SUBJECT, html))
            .await
    }

    // In-app channel (social interactions); self-notifications return None

    pub async fn send_like_notification(
        &self,
        recipient_id: &str,
        actor_id: &str,
        post_id: &str,
    ) -> Result<Option<JobHandle>> {
        self.create_in_app_notification(
            InteractionJob::new(NotificationType::Like, recipient_id, "liked your post.")
                .actor(actor_id)
                .related(post_id),
        )
        .await
    }

    pub async fn send_comment_notification(
        &self,
        recipient_id: &str,
        actor_id: &str,
        post_id: &str,
        comment_preview: &str,
    ) -> Result<Option<JobHandle>> {
        self.create_in_app_notification(
            InteractionJob::new(
                NotificationType::Comment,
                recipient_id,
                format!("commented: \"{}\"", comment_preview),
            )
            .actor(actor_id)
            .related(post_id),
        )
        .await
    }

    /// The related id of a follow is the follower
    pub async fn send_follow_notification(
        &self,
        recipient_id: &str,
        actor_id: &str,
    ) -> Result<Option<JobHandle>> {
        self.create_in_app_notification(
            InteractionJob::new(NotificationType::Follow, recipient_id, "started following you.")
                .actor(actor_id)
                .related(actor_id),
        )
        .await
    }

    pub async fn send_share_notification(
        &self,
        recipient_id: &str,
        actor_id: &str,
        post_id: &str,
    ) -> Result<Option<JobHandle>> {
        self.create_in_app_notification(
            InteractionJob::new(NotificationType::Share, recipient_id, "shared your post.")
                .actor(actor_id)
                .related(post_id),
        )
        .await
    }

    async fn create_in_app_notification(&self, job: InteractionJob) -> Result<Option<JobHandle>> {
        self.producer.add_interaction_job(job).await
    }
}
