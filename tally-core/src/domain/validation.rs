//! Pipeline validation types

use serde::{Deserialize, Serialize};

use crate::domain::task::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputState {
    /// A row exists and its payload has the expected shape
    Present,
    Missing,
    /// A row exists but its payload does not decode
    Malformed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputCheck {
    pub task_id: TaskId,
    pub state: OutputState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Payload of a validation row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Timestamp filter the check ran against, if any
    pub timestamp: Option<String>,
    pub checks: Vec<OutputCheck>,
}

impl ValidationReport {
    pub fn is_complete(&self) -> bool {
        self.checks.iter().all(|c| c.state == OutputState::Present)
    }
}
