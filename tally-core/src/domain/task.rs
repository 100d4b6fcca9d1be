//! Task domain types

use chrono::{DateTime, Timelike, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::cashflow::Granularity;

/// Format used when a task result timestamp is addressed by callers.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H:%M";

/// Pipeline stages that can be requested by id
///
/// The numeric ids are part of the public API (`/api/run-task/{task_id}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TaskId {
    CashFlow,
    Segmentation,
    PriceOptimization,
    ThresholdCheck,
    Validation,
    Notification,
    Dispatch,
}

impl TaskId {
    pub const ALL: [TaskId; 7] = [
        TaskId::CashFlow,
        TaskId::Segmentation,
        TaskId::PriceOptimization,
        TaskId::ThresholdCheck,
        TaskId::Validation,
        TaskId::Notification,
        TaskId::Dispatch,
    ];

    pub fn number(self) -> u8 {
        match self {
            TaskId::CashFlow => 2,
            TaskId::Segmentation => 3,
            TaskId::PriceOptimization => 5,
            TaskId::ThresholdCheck => 7,
            TaskId::Validation => 8,
            TaskId::Notification => 9,
            TaskId::Dispatch => 10,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TaskId::CashFlow => "cash-flow",
            TaskId::Segmentation => "segmentation",
            TaskId::PriceOptimization => "price-optimization",
            TaskId::ThresholdCheck => "threshold-check",
            TaskId::Validation => "validation",
            TaskId::Notification => "notification",
            TaskId::Dispatch => "dispatch",
        }
    }

    /// Tasks whose persisted output this task reads
    pub fn dependencies(self) -> &'static [TaskId] {
        match self {
            TaskId::CashFlow | TaskId::Segmentation | TaskId::Validation => &[],
            TaskId::PriceOptimization => &[TaskId::Segmentation],
            TaskId::ThresholdCheck => &[
                TaskId::Segmentation,
                TaskId::CashFlow,
                TaskId::PriceOptimization,
            ],
            TaskId::Notification => &[TaskId::ThresholdCheck],
            TaskId::Dispatch => &[
                TaskId::Segmentation,
                TaskId::PriceOptimization,
                TaskId::Notification,
            ],
        }
    }
}

impl From<TaskId> for u8 {
    fn from(task: TaskId) -> Self {
        task.number()
    }
}

impl TryFrom<u8> for TaskId {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        TaskId::ALL
            .into_iter()
            .find(|task| task.number() == value)
            .ok_or_else(|| format!("Invalid task ID: {}", value))
    }
}

impl std::str::FromStr for TaskId {
    type Err = String;

    /// Accepts either the numeric id ("3") or the task name ("segmentation")
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(number) = s.parse::<u8>() {
            return TaskId::try_from(number);
        }
        TaskId::ALL
            .into_iter()
            .find(|task| task.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown task: {}", s))
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.number(), self.name())
    }
}

/// Outcome status of a task run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Success,
    Error,
    NoData,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Success => "success",
            TaskStatus::Error => "error",
            TaskStatus::NoData => "no_data",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(TaskStatus::Success),
            "error" => Some(TaskStatus::Error),
            "no_data" => Some(TaskStatus::NoData),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution context shared by every row a single task run writes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub pipeline_id: String,
    pub schema_version: String,
    pub timestamp: DateTime<Utc>,
}

impl PipelineRun {
    /// Start a run stamped with the current minute
    pub fn new(pipeline_id: impl Into<String>, schema_version: impl Into<String>) -> Self {
        Self::at(pipeline_id, schema_version, Utc::now())
    }

    pub fn at(
        pipeline_id: impl Into<String>,
        schema_version: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
            schema_version: schema_version.into(),
            timestamp: truncate_to_minute(timestamp),
        }
    }
}

/// One persisted outcome of running a task
///
/// Owned by the orchestrator; engines never construct these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub id: Uuid,
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub payload: serde_json::Value,
    pub message: Option<String>,
    pub pipeline_id: String,
    pub schema_version: String,
    /// Set on cash-flow rows that hold a single granularity
    #[serde(default)]
    pub granularity: Option<Granularity>,
    /// Marks the one summary row a multi-row run writes
    #[serde(default)]
    pub summary: bool,
    pub timestamp: DateTime<Utc>,
}

impl TaskResult {
    pub fn new(
        run: &PipelineRun,
        task_id: TaskId,
        status: TaskStatus,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            status,
            payload,
            message: None,
            pipeline_id: run.pipeline_id.clone(),
            schema_version: run.schema_version.clone(),
            granularity: None,
            summary: false,
            timestamp: run.timestamp,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = Some(granularity);
        self
    }

    pub fn as_summary(mut self) -> Self {
        self.summary = true;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Success
    }

    /// Decode the payload into the shape the producing engine emits
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }

    /// Timestamp rendered in [`TIMESTAMP_FORMAT`]
    pub fn timestamp_key(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }
}

pub fn truncate_to_minute(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_task_id_round_trips_through_number() {
        for task in TaskId::ALL {
            assert_eq!(TaskId::try_from(task.number()), Ok(task));
        }
        assert!(TaskId::try_from(1).is_err());
        assert!(TaskId::try_from(4).is_err());
    }

    #[test]
    fn test_task_id_serializes_as_number() {
        let json = serde_json::to_value(TaskId::ThresholdCheck).unwrap();
        assert_eq!(json, serde_json::json!(7));

        let parsed: TaskId = serde_json::from_value(serde_json::json!(10)).unwrap();
        assert_eq!(parsed, TaskId::Dispatch);
    }

    #[test]
    fn test_task_id_from_str_accepts_names() {
        assert_eq!("segmentation".parse::<TaskId>(), Ok(TaskId::Segmentation));
        assert_eq!("Cash-Flow".parse::<TaskId>(), Ok(TaskId::CashFlow));
        assert_eq!("5".parse::<TaskId>(), Ok(TaskId::PriceOptimization));
        assert!("forecast".parse::<TaskId>().is_err());
    }

    #[test]
    fn test_pipeline_run_truncates_to_minute() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 9, 14, 27, 41).unwrap();
        let run = PipelineRun::at("demo", "v1", instant);
        assert_eq!(run.timestamp, Utc.with_ymd_and_hms(2024, 3, 9, 14, 27, 0).unwrap());

        let result = TaskResult::new(
            &run,
            TaskId::Segmentation,
            TaskStatus::Success,
            serde_json::json!({}),
        );
        assert_eq!(result.timestamp_key(), "2024-03-09_14:27");
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_value(TaskStatus::NoData).unwrap();
        assert_eq!(json, serde_json::json!("no_data"));
        assert_eq!(TaskStatus::parse("error"), Some(TaskStatus::Error));
        assert_eq!(TaskStatus::parse("queued"), None);
    }
}
