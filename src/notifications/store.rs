//! Notification persistence

use super::models::{NewNotification, Notification};
use crate::error::{JobsError, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

/// Where in-app notifications are written
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Persist one notification, returning the stored row once the write is acknowledged
    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification>;
}

/// In-memory notification store for development and tests
#[derive(Debug, Default)]
pub struct InMemoryNotificationStore {
    rows: RwLock<Vec<Notification>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<Notification> {
        self.rows.read().await.clone()
    }

    /// Notifications of one recipient, oldest first
    pub async fn for_recipient(&self, recipient_id: &str) -> Vec<Notification> {
        self.rows
            .read()
            .await
            .iter()
            .filter(|n| n.recipient_id == recipient_id)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification> {
        if notification.recipient_id.trim().is_empty() {
            return Err(JobsError::validation("Notification recipient is required"));
        }

        let mut rows = self.rows.write().await;
        let row = Notification {
            id: rows.len() as i64 + 1,
            recipient_id: notification.recipient_id,
            notification_type: notification.notification_type,
            message: notification.message,
            related_id: notification.related_id,
            is_read: false,
            created_at: Utc::now(),
        };
        rows.push(row.clone());
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::NotificationType;

    fn like(recipient: &str) -> NewNotification {
        NewNotification {
            recipient_id: recipient.to_string(),
            notification_type: NotificationType::Like,
            message: "liked your post.".to_string(),
            related_id: Some("post-1".to_string()),
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_ids_and_defaults() {
        let store = InMemoryNotificationStore::new();
        let first = store.insert_notification(like("u1")).await.unwrap();
        let second = store.insert_notification(like("u2")).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert!(!first.is_read);
        assert_eq!(store.len().await, 2);
        assert_eq!(store.for_recipient("u2").await, vec![second]);
    }

    #[tokio::test]
    async fn test_rejects_missing_recipient() {
        let store = InMemoryNotificationStore::new();
        assert!(store.insert_notification(like("")).await.is_err());
        assert!(store.is_empty().await);
    }
}
