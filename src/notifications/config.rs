use crate::utils::get_env_with_prefix;
use serde::{Deserialize, Serialize};

/// Settings used when rendering notifications
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationsConfig {
    /// Base URL of the web client, used for links in emails
    #[serde(default = "default_client_url")]
    pub client_url: String,

    /// Product name shown in subjects and email headers
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            client_url: default_client_url(),
            app_name: default_app_name(),
        }
    }
}

impl NotificationsConfig {
    /// Load from `CLIENT_URL` and `APP_NAME`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(url) = get_env_with_prefix("CLIENT_URL").filter(|u| !u.trim().is_empty()) {
            config.client_url = url;
        }
        if let Some(name) = get_env_with_prefix("APP_NAME").filter(|n| !n.trim().is_empty()) {
            config.app_name = name;
        }
        config
    }
}

fn default_client_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_app_name() -> String {
    "Writespace".to_string()
}
