//! Notification API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use std::sync::Arc;
use tally_core::domain::notification::Notification;
use tally_core::dto::notification::{NotificationQuery, UpdateNotificationResponse};
use uuid::Uuid;

use crate::api::error::ApiResult;
use crate::service::TaskOrchestrator;

/// GET /api/notifications?timestamp=&read=
pub async fn list_notifications(
    State(orchestrator): State<Arc<TaskOrchestrator>>,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<Json<Vec<Notification>>> {
    tracing::debug!("Listing notifications: {:?}", query);

    let notifications = orchestrator.list_notifications(&query).await?;
    Ok(Json(notifications))
}

/// PUT /api/notifications/{id}
pub async fn mark_read(
    State(orchestrator): State<Arc<TaskOrchestrator>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UpdateNotificationResponse>> {
    orchestrator.mark_notification_read(id).await?;
    Ok(Json(UpdateNotificationResponse {
        status: "updated".to_string(),
    }))
}
