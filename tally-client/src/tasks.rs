//! Task-related API endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use tally_core::domain::task::{TaskId, TaskResult};
use tally_core::dto::task::{LatestPipeline, TaskEnvelope, TaskParams, TaskResultsQuery};

impl OrchestratorClient {
    // =============================================================================
    // Tasks
    // =============================================================================

    /// Run a task and return its result envelope
    ///
    /// # Example
    /// ```no_run
    /// # use tally_client::OrchestratorClient;
    /// # use tally_core::domain::task::TaskId;
    /// # use tally_core::dto::task::TaskParams;
    /// # async fn example() -> anyhow::Result<()> {
    /// let client = OrchestratorClient::new("http://localhost:8080");
    /// let mut params = TaskParams::new();
    /// params.insert("granularity".to_string(), "monthly".into());
    /// let envelope = client.run_task(TaskId::CashFlow, &params).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run_task(&self, task_id: TaskId, params: &TaskParams) -> Result<TaskEnvelope> {
        let url = self.url(&format!("/api/run-task/{}", task_id.number()));
        tracing::debug!("Running task {} via {}", task_id, url);
        let response = self.client.post(&url).json(params).send().await?;

        self.handle_response(response).await
    }

    /// Stored rows for a task, newest first
    ///
    /// `timestamp` narrows the rows to one run (`YYYY-MM-DD_HH:MM`).
    pub async fn task_results(
        &self,
        task_id: TaskId,
        timestamp: Option<&str>,
    ) -> Result<Vec<TaskResult>> {
        let url = self.url(&format!("/api/task-results/{}", task_id.number()));
        let query = TaskResultsQuery {
            timestamp: timestamp.map(str::to_string),
        };
        let response = self.client.get(&url).query(&query).send().await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Pipeline
    // =============================================================================

    /// Schema version and timestamp of the most recent stored result
    pub async fn latest_pipeline(&self) -> Result<LatestPipeline> {
        let response = self
            .client
            .get(self.url("/api/latest-pipeline"))
            .send()
            .await?;

        self.handle_response(response).await
    }
}
