//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::service::TaskError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<TaskError> for ApiError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::Validation(_) => ApiError::BadRequest(err.to_string()),
            TaskError::NotFound(msg) => ApiError::NotFound(msg),
            TaskError::Engine { .. }
            | TaskError::Persistence(_)
            | TaskError::UpstreamMissing(_)
            | TaskError::Source(_) => ApiError::InternalError(err.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::domain::task::TaskId;

    #[test]
    fn test_status_mapping() {
        let status = |err: TaskError| ApiError::from(err).into_response().status();

        assert_eq!(
            status(TaskError::Validation("bad".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(TaskError::NotFound("gone".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(TaskError::Engine {
                task: TaskId::Segmentation,
                message: "diverged".to_string(),
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
