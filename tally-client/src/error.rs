//! Error types for the Tally client

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when using the Tally client
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// API returned an error status code
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),
}

impl ClientError {
    /// Create an error from a non-success status and the response body
    ///
    /// The orchestrator reports failures as `{"error": "..."}`; other bodies
    /// are kept verbatim.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("error")?.as_str().map(str::to_string))
            .unwrap_or_else(|| body.to_string());

        if status == 404 {
            Self::NotFound(message)
        } else {
            Self::ApiError { status, message }
        }
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this error is a client error (4xx status)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::NotFound(_))
            || matches!(self, Self::ApiError { status, .. } if *status >= 400 && *status < 500)
    }

    /// Check if this error is a server error (5xx status)
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_error_field() {
        let err = ClientError::from_response(
            400,
            r#"{"error": "Validation error: Unknown task: 4"}"#,
        );
        match &err {
            ClientError::ApiError { status, message } => {
                assert_eq!(*status, 400);
                assert_eq!(message, "Validation error: Unknown task: 4");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_client_error());
        assert!(!err.is_server_error());
    }

    #[test]
    fn test_not_found_and_plain_bodies() {
        let err = ClientError::from_response(404, r#"{"error": "No results"}"#);
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Not found: No results");

        let err = ClientError::from_response(502, "Bad Gateway");
        assert!(err.is_server_error());
        assert_eq!(err.to_string(), "API error (status 502): Bad Gateway");
    }
}
