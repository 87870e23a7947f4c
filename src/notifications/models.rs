use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of in-app notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    Welcome,
    Like,
    Comment,
    Follow,
    Share,
    System,
    LoginAlert,
}

impl NotificationType {
    pub const ALL: [NotificationType; 7] = [
        Self::Welcome,
        Self::Like,
        Self::Comment,
        Self::Follow,
        Self::Share,
        Self::System,
        Self::LoginAlert,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Welcome => "WELCOME",
            Self::Like => "LIKE",
            Self::Comment => "COMMENT",
            Self::Follow => "FOLLOW",
            Self::Share => "SHARE",
            Self::System => "SYSTEM",
            Self::LoginAlert => "LOGIN_ALERT",
        }
    }

    /// Interactions one user performs on another's content
    ///
    /// These are never delivered to the user who performed them.
    pub fn is_social(&self) -> bool {
        matches!(self, Self::Like | Self::Comment | Self::Follow | Self::Share)
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown notification type: {}", s))
    }
}

/// A notification to be written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotification {
    pub recipient_id: String,
    pub notification_type: NotificationType,
    pub message: String,
    /// Post, comment or user the notification points at
    pub related_id: Option<String>,
}

/// A stored notification row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub recipient_id: String,
    pub notification_type: NotificationType,
    pub message: String,
    pub related_id: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
