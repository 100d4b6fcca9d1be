//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod error;
pub mod health;
pub mod notification;
pub mod pipeline;
pub mod task;

use axum::{
    Router,
    routing::{get, post, put},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::service::TaskOrchestrator;

/// Create the main API router with all endpoints
pub fn create_router(orchestrator: Arc<TaskOrchestrator>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Task endpoints
        .route("/api/run-task/{task_id}", post(task::run_task))
        .route("/api/task-results/{task_id}", get(task::get_task_results))
        // Notification endpoints
        .route("/api/notifications", get(notification::list_notifications))
        .route("/api/notifications/{id}", put(notification::mark_read))
        // Pipeline endpoints
        .route("/api/latest-pipeline", get(pipeline::latest_pipeline))
        // Add state and middleware
        .with_state(orchestrator)
        .layer(TraceLayer::new_for_http())
}
