//! In-app notifications and the account email facade

mod config;
mod models;
mod service;
mod store;
mod templates;

#[cfg(feature = "database")]
mod sea_orm_store;

pub use config::NotificationsConfig;
pub use models::{NewNotification, Notification, NotificationType};
pub use service::{NotificationService, OTP_SUBJECT};
pub use store::{InMemoryNotificationStore, NotificationStore};
pub use templates::{EmailTemplates, escape_html};

#[cfg(feature = "database")]
pub use sea_orm_store::SeaOrmNotificationStore;
