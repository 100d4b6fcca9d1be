//! Task API Handlers
//!
//! Run a task and read back its stored results.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
};
use std::sync::Arc;
use tally_core::domain::task::{TaskId, TaskResult};
use tally_core::dto::task::{TaskEnvelope, TaskParams, TaskResultsQuery};

use crate::api::error::{ApiError, ApiResult};
use crate::service::TaskOrchestrator;

/// POST /api/run-task/{task_id}
///
/// The body is the task's parameter object; an empty body runs with defaults.
pub async fn run_task(
    State(orchestrator): State<Arc<TaskOrchestrator>>,
    Path(task_id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<TaskEnvelope>> {
    let task_id = parse_task_id(&task_id)?;
    let params = parse_body(&body)?;

    let result = orchestrator.run_task(task_id, params).await?;
    Ok(Json(TaskEnvelope::from(result)))
}

/// GET /api/task-results/{task_id}?timestamp=
pub async fn get_task_results(
    State(orchestrator): State<Arc<TaskOrchestrator>>,
    Path(task_id): Path<String>,
    Query(query): Query<TaskResultsQuery>,
) -> ApiResult<Json<Vec<TaskResult>>> {
    let task_id = parse_task_id(&task_id)?;
    tracing::debug!("Getting results for task {}", task_id);

    let rows = orchestrator
        .task_results(task_id, query.timestamp.as_deref())
        .await?;
    Ok(Json(rows))
}

fn parse_task_id(raw: &str) -> ApiResult<TaskId> {
    raw.parse::<TaskId>().map_err(ApiError::BadRequest)
}

fn parse_body(body: &[u8]) -> ApiResult<TaskParams> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(TaskParams::new());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid task parameters: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_task_id() {
        assert_eq!(parse_task_id("3").unwrap(), TaskId::Segmentation);
        assert!(matches!(parse_task_id("4"), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_parse_body() {
        assert!(parse_body(b"").unwrap().is_empty());
        assert!(parse_body(b"  \n").unwrap().is_empty());

        let params = parse_body(br#"{"n_clusters": 4}"#).unwrap();
        assert_eq!(params["n_clusters"], 4);

        assert!(matches!(parse_body(b"[1, 2]"), Err(ApiError::BadRequest(_))));
        assert!(matches!(parse_body(b"{oops"), Err(ApiError::BadRequest(_))));
    }
}
