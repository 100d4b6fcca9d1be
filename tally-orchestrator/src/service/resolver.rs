//! Dependency Resolver
//!
//! Looks up the persisted output a task depends on. Only the newest
//! `success` row under the same schema version counts; a payload that does
//! not decode into the expected shape counts as missing.
//!
//! Fallbacks are decided by the orchestrator per dependent task:
//!
//! | Dependent          | Dependency         | Order                                     |
//! |--------------------|--------------------|-------------------------------------------|
//! | price-optimization | segmentation       | persisted, live, no_data                  |
//! | threshold-check    | segmentation       | persisted, live, empty                    |
//! | threshold-check    | cash-flow          | persisted, live monthly, empty            |
//! | threshold-check    | price-optimization | persisted narrative, none                 |
//! | notification       | threshold-check    | `triggers` param, persisted, empty        |
//! | dispatch           | segmentation       | persisted, live, empty                    |
//! | dispatch           | price-optimization | persisted, none                           |
//! | dispatch           | notification       | persisted, empty                          |

use serde::de::DeserializeOwned;
use std::sync::Arc;
use tally_core::domain::cashflow::{CashFlowSnapshot, CashFlowSummary, Granularity};
use tally_core::domain::notification::{DispatchReport, NotificationBatch};
use tally_core::domain::pricing::PriceOptimizationResult;
use tally_core::domain::segment::SegmentationResult;
use tally_core::domain::task::{TaskId, TaskResult};
use tally_core::domain::trigger::ThresholdReport;
use tally_core::domain::validation::ValidationReport;

use crate::repository::{ResultQuery, ResultStore, StoreError};
use crate::service::orchestrator::TaskError;

/// Granularity preference when cash-flow output is consumed downstream
const CASH_FLOW_PREFERENCE: [Granularity; 4] = [
    Granularity::Monthly,
    Granularity::Weekly,
    Granularity::Quarterly,
    Granularity::Yearly,
];

pub struct DependencyResolver {
    store: Arc<dyn ResultStore>,
    pipeline_id: String,
}

impl DependencyResolver {
    pub fn new(store: Arc<dyn ResultStore>, pipeline_id: impl Into<String>) -> Self {
        Self {
            store,
            pipeline_id: pipeline_id.into(),
        }
    }

    /// The persisted row a dependent task should read, if any
    ///
    /// Cash-flow rows are picked by granularity preference
    /// (monthly, weekly, quarterly, yearly); the summary row is never used.
    pub async fn resolve(
        &self,
        task_id: TaskId,
        schema_version: &str,
    ) -> Result<Option<TaskResult>, StoreError> {
        let rows = self
            .store
            .find(&ResultQuery {
                task_id,
                pipeline_id: &self.pipeline_id,
                schema_version,
                timestamp: None,
            })
            .await?;

        let mut usable = rows.into_iter().filter(|r| r.is_success());

        if task_id != TaskId::CashFlow {
            return Ok(usable.next());
        }

        let rows: Vec<TaskResult> = usable.filter(|r| !r.summary).collect();
        Ok(CASH_FLOW_PREFERENCE.iter().find_map(|&g| {
            rows.iter().find(|r| r.granularity == Some(g)).cloned()
        }))
    }

    /// Decode a dependency's persisted output
    ///
    /// Fails with `UpstreamMissing` when there is no usable row or its
    /// payload has the wrong shape.
    pub async fn load<T: DeserializeOwned>(
        &self,
        task_id: TaskId,
        schema_version: &str,
    ) -> Result<T, TaskError> {
        let Some(row) = self.resolve(task_id, schema_version).await? else {
            tracing::warn!(
                "No persisted output for task {} under {}",
                task_id,
                schema_version
            );
            return Err(TaskError::UpstreamMissing(task_id));
        };

        row.decode().map_err(|e| {
            tracing::warn!(
                "Persisted output for task {} has an unexpected shape: {}",
                task_id,
                e
            );
            TaskError::UpstreamMissing(task_id)
        })
    }
}

/// Check that a row's payload decodes into what its task produces
///
/// Rows that did not succeed carry no payload contract and always pass.
pub fn check_shape(row: &TaskResult) -> Result<(), serde_json::Error> {
    fn probe<T: DeserializeOwned>(row: &TaskResult) -> Result<(), serde_json::Error> {
        row.decode::<T>().map(|_| ())
    }

    if !row.is_success() {
        return Ok(());
    }

    match row.task_id {
        TaskId::CashFlow if row.summary => probe::<CashFlowSummary>(row),
        TaskId::CashFlow => probe::<CashFlowSnapshot>(row),
        TaskId::Segmentation => probe::<SegmentationResult>(row),
        TaskId::PriceOptimization => probe::<PriceOptimizationResult>(row),
        TaskId::ThresholdCheck => probe::<ThresholdReport>(row),
        TaskId::Validation => probe::<ValidationReport>(row),
        TaskId::Notification => probe::<NotificationBatch>(row),
        TaskId::Dispatch => probe::<DispatchReport>(row),
    }
}
