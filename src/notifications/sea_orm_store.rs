//! SeaORM-backed notification store.
//!
//! Writes into the `notifications` table:
//!
//! ```sql
//! CREATE TYPE notification_type AS ENUM
//!     ('WELCOME', 'LIKE', 'COMMENT', 'FOLLOW', 'SHARE', 'SYSTEM', 'LOGIN_ALERT');
//!
//! CREATE TABLE notifications (
//!     id SERIAL PRIMARY KEY,
//!     recipient_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
//!     type notification_type NOT NULL,
//!     message TEXT NOT NULL,
//!     related_id TEXT,
//!     is_read BOOLEAN NOT NULL DEFAULT FALSE,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

use super::models::{NewNotification, Notification, NotificationType};
use super::store::NotificationStore;
use crate::database::DatabasePool;
use crate::error::{JobsError, Result};

mod entity {
    pub mod notification {
        use sea_orm::entity::prelude::*;

        #[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
        #[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "notification_type")]
        pub enum Kind {
            #[sea_orm(string_value = "WELCOME")]
            Welcome,
            #[sea_orm(string_value = "LIKE")]
            Like,
            #[sea_orm(string_value = "COMMENT")]
            Comment,
            #[sea_orm(string_value = "FOLLOW")]
            Follow,
            #[sea_orm(string_value = "SHARE")]
            Share,
            #[sea_orm(string_value = "SYSTEM")]
            System,
            #[sea_orm(string_value = "LOGIN_ALERT")]
            LoginAlert,
        }

        #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
        #[sea_orm(table_name = "notifications")]
        pub struct Model {
            #[sea_orm(primary_key)]
            pub id: i32,
            pub recipient_id: Uuid,
            #[sea_orm(column_name = "type")]
            pub kind: Kind,
            #[sea_orm(column_type = "Text")]
            pub message: String,
            #[sea_orm(column_type = "Text", nullable)]
            pub related_id: Option<String>,
            pub is_read: bool,
            pub created_at: DateTimeWithTimeZone,
            pub updated_at: DateTimeWithTimeZone,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}
    }
}

use entity::notification;

fn kind_from_type(notification_type: NotificationType) -> notification::Kind {
    match notification_type {
        NotificationType::Welcome => notification::Kind::Welcome,
        NotificationType::Like => notification::Kind::Like,
        NotificationType::Comment => notification::Kind::Comment,
        NotificationType::Follow => notification::Kind::Follow,
        NotificationType::Share => notification::Kind::Share,
        NotificationType::System => notification::Kind::System,
        NotificationType::LoginAlert => notification::Kind::LoginAlert,
    }
}

fn type_from_kind(kind: notification::Kind) -> NotificationType {
    match kind {
        notification::Kind::Welcome => NotificationType::Welcome,
        notification::Kind::Like => NotificationType::Like,
        notification::Kind::Comment => NotificationType::Comment,
        notification::Kind::Follow => NotificationType::Follow,
        notification::Kind::Share => NotificationType::Share,
        notification::Kind::System => NotificationType::System,
        notification::Kind::LoginAlert => NotificationType::LoginAlert,
    }
}

fn model_to_notification(model: notification::Model) -> Notification {
    Notification {
        id: i64::from(model.id),
        recipient_id: model.recipient_id.to_string(),
        notification_type: type_from_kind(model.kind),
        message: model.message,
        related_id: model.related_id,
        is_read: model.is_read,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

/// Notification store backed by Postgres through SeaORM
#[derive(Clone, Debug)]
pub struct SeaOrmNotificationStore {
    db: DatabaseConnection,
}

impl SeaOrmNotificationStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn from_pool(pool: &DatabasePool) -> Self {
        Self::new(pool.connection())
    }
}

#[async_trait]
impl NotificationStore for SeaOrmNotificationStore {
    async fn insert_notification(&self, new: NewNotification) -> Result<Notification> {
        let recipient_id = uuid::Uuid::parse_str(new.recipient_id.trim()).map_err(|e| {
            JobsError::validation(format!(
                "Invalid notification recipient '{}': {}",
                new.recipient_id, e
            ))
        })?;
        let now = Utc::now().fixed_offset();

        let model = notification::ActiveModel {
            recipient_id: Set(recipient_id),
            kind: Set(kind_from_type(new.notification_type)),
            message: Set(new.message),
            related_id: Set(new.related_id),
            is_read: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        Ok(model_to_notification(model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping_covers_every_type() {
        for t in NotificationType::ALL {
            assert_eq!(type_from_kind(kind_from_type(t)), t);
        }
    }

    #[test]
    fn test_model_to_notification() {
        let recipient = uuid::Uuid::new_v4();
        let now = Utc::now().fixed_offset();
        let model = notification::Model {
            id: 7,
            recipient_id: recipient,
            kind: notification::Kind::Follow,
            message: "started following you.".to_string(),
            related_id: Some("actor-1".to_string()),
            is_read: false,
            created_at: now,
            updated_at: now,
        };

        let notification = model_to_notification(model);
        assert_eq!(notification.id, 7);
        assert_eq!(notification.recipient_id, recipient.to_string());
        assert_eq!(notification.notification_type, NotificationType::Follow);
    }
}
