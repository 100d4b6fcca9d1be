//! Tally HTTP Client
//!
//! A type-safe HTTP client for the Tally orchestrator API, shared by the CLI
//! and by anything else that drives pipeline tasks remotely.
//!
//! # Example
//!
//! ```no_run
//! use tally_client::OrchestratorClient;
//! use tally_core::domain::task::TaskId;
//! use tally_core::dto::task::TaskParams;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = OrchestratorClient::new("http://localhost:8080");
//!
//!     let envelope = client.run_task(TaskId::Segmentation, &TaskParams::new()).await?;
//!     println!("Segmentation finished with status {}", envelope.status);
//!     Ok(())
//! }
//! ```

pub mod error;
mod notifications;
mod tasks;

// Re-export commonly used types
pub use error::{ClientError, Result};

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the Tally orchestrator API
///
/// Endpoints are grouped by concern:
/// - Task runs and stored results
/// - Notifications
/// - Pipeline status and health
#[derive(Debug, Clone)]
pub struct OrchestratorClient {
    /// Base URL of the orchestrator (e.g., "http://localhost:8080")
    base_url: String,
    client: Client,
}

impl OrchestratorClient {
    /// Create a new orchestrator client
    ///
    /// # Example
    /// ```
    /// use tally_client::OrchestratorClient;
    ///
    /// let client = OrchestratorClient::new("http://localhost:8080");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new orchestrator client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the orchestrator
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check that the orchestrator answers its health endpoint
    pub async fn health(&self) -> Result<()> {
        let response = self.client.get(self.url("/health")).send().await?;
        self.handle_empty_response(response).await
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::from_response(status.as_u16(), &error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response whose body is not needed
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::from_response(status.as_u16(), &error_text));
        }

        Ok(())
    }
}
