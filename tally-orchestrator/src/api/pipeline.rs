//! Pipeline API Handlers

use axum::{Json, extract::State};
use std::sync::Arc;
use tally_core::dto::task::LatestPipeline;

use crate::api::error::ApiResult;
use crate::service::TaskOrchestrator;

/// GET /api/latest-pipeline
/// Schema version and timestamp of the most recent stored result
pub async fn latest_pipeline(
    State(orchestrator): State<Arc<TaskOrchestrator>>,
) -> ApiResult<Json<LatestPipeline>> {
    let latest = orchestrator.latest_pipeline().await?;
    Ok(Json(latest))
}
