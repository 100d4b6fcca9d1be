//! Notification-related API endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use tally_core::domain::notification::Notification;
use tally_core::dto::notification::{NotificationQuery, UpdateNotificationResponse};
use uuid::Uuid;

impl OrchestratorClient {
    /// List notifications, newest first
    pub async fn list_notifications(&self, query: &NotificationQuery) -> Result<Vec<Notification>> {
        let response = self
            .client
            .get(self.url("/api/notifications"))
            .query(query)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Mark a notification as read
    pub async fn mark_notification_read(&self, id: Uuid) -> Result<UpdateNotificationResponse> {
        let url = self.url(&format!("/api/notifications/{}", id));
        let response = self.client.put(&url).send().await?;

        self.handle_response(response).await
    }
}
