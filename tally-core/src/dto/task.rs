//! Task DTOs
//!
//! `TaskParams` is the raw JSON object a caller posts to run a task. Each
//! task decodes it into its own parameter struct; unknown keys are ignored.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::cashflow::GranularitySelection;
use crate::domain::sales::SalesRecord;
use crate::domain::task::{TaskId, TaskResult, TaskStatus};
use crate::domain::trigger::Trigger;

/// Raw task parameters as posted by callers
pub type TaskParams = HashMap<String, serde_json::Value>;

/// Decode raw parameters into a task's parameter struct
pub fn parse_params<T: DeserializeOwned>(params: &TaskParams) -> Result<T, String> {
    let object: serde_json::Map<String, serde_json::Value> =
        params.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    serde_json::from_value(serde_json::Value::Object(object))
        .map_err(|e| format!("Invalid task parameters: {}", e))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationParams {
    /// Overrides the configured sales data source
    #[serde(default)]
    pub sales_data: Option<Vec<SalesRecord>>,
    #[serde(default = "default_n_clusters")]
    pub n_clusters: usize,
    #[serde(default = "default_max_preview_size", alias = "max_graph_customers")]
    pub max_preview_size: usize,
    #[serde(default = "default_true")]
    pub include_reports: bool,
}

impl Default for SegmentationParams {
    fn default() -> Self {
        Self {
            sales_data: None,
            n_clusters: default_n_clusters(),
            max_preview_size: default_max_preview_size(),
            include_reports: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CashFlowParams {
    #[serde(default)]
    pub granularity: GranularitySelection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationParams {
    /// Only consider rows written at this `YYYY-MM-DD_HH:MM` timestamp
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationParams {
    /// Overrides the persisted threshold-check triggers
    #[serde(default)]
    pub triggers: Option<Vec<Trigger>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchParams {
    /// Segment label or "admin" -> email address, merged over the configured list
    #[serde(default)]
    pub recipients: HashMap<String, String>,
}

fn default_n_clusters() -> usize {
    3
}

fn default_max_preview_size() -> usize {
    50
}

fn default_true() -> bool {
    true
}

/// Normalized response returned for every task run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub status: TaskStatus,
    pub result: serde_json::Value,
    #[serde(default)]
    pub message: Option<String>,
    pub pipeline_id: String,
    pub schema_version: String,
    pub task_id: TaskId,
    pub timestamp: DateTime<Utc>,
}

impl From<TaskResult> for TaskEnvelope {
    fn from(result: TaskResult) -> Self {
        Self {
            status: result.status,
            result: result.payload,
            message: result.message,
            pipeline_id: result.pipeline_id,
            schema_version: result.schema_version,
            task_id: result.task_id,
            timestamp: result.timestamp,
        }
    }
}

/// Query accepted by the task result listing endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskResultsQuery {
    pub timestamp: Option<String>,
}

/// Most recent run information for the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestPipeline {
    pub schema_version: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cashflow::Granularity;

    fn params(json: serde_json::Value) -> TaskParams {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_segmentation_params_defaults() {
        let parsed: SegmentationParams = parse_params(&TaskParams::new()).unwrap();
        assert_eq!(parsed, SegmentationParams::default());
        assert_eq!(parsed.n_clusters, 3);
        assert_eq!(parsed.max_preview_size, 50);
        assert!(parsed.include_reports);
    }

    #[test]
    fn test_segmentation_params_legacy_alias() {
        let parsed: SegmentationParams =
            parse_params(&params(serde_json::json!({"max_graph_customers": 5, "n_clusters": 2})))
                .unwrap();
        assert_eq!(parsed.max_preview_size, 5);
        assert_eq!(parsed.n_clusters, 2);
    }

    #[test]
    fn test_cash_flow_params() {
        let parsed: CashFlowParams =
            parse_params(&params(serde_json::json!({"granularity": "monthly"}))).unwrap();
        assert_eq!(
            parsed.granularity,
            GranularitySelection::Only(Granularity::Monthly)
        );

        let invalid =
            parse_params::<CashFlowParams>(&params(serde_json::json!({"granularity": "hourly"})));
        assert!(invalid.is_err());
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let parsed: ValidationParams =
            parse_params(&params(serde_json::json!({"rerun": true}))).unwrap();
        assert!(parsed.timestamp.is_none());
    }
}
