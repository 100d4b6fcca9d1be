//! Notification DTOs

use serde::{Deserialize, Serialize};

/// Filters accepted by the notification listing endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationQuery {
    /// Run timestamp in `YYYY-MM-DD_HH:MM` form
    pub timestamp: Option<String>,
    pub read: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateNotificationResponse {
    pub status: String,
}
