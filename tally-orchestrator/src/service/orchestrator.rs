//! Task Orchestrator
//!
//! Runs one pipeline task per request:
//! 1. resolve the active schema version
//! 2. gather dependency outputs through the [`DependencyResolver`]
//! 3. invoke the engine
//! 4. atomically replace the task's stored rows with the new ones
//!
//! Engine failures are persisted as an `error` row and then returned to the
//! caller. An engine reporting empty input produces a `no_data` row and is
//! not a failure.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tally_core::domain::cashflow::{
    CashFlowBucket, CashFlowSnapshot, CashFlowSummary, Granularity, GranularitySelection,
    GranularitySummary,
};
use tally_core::domain::notification::{Notification, NotificationBatch};
use tally_core::domain::pricing::PriceOptimizationResult;
use tally_core::domain::sales::SalesRecord;
use tally_core::domain::segment::SegmentationResult;
use tally_core::domain::task::{PipelineRun, TIMESTAMP_FORMAT, TaskId, TaskResult, TaskStatus};
use tally_core::domain::trigger::{ThresholdReport, Trigger, TriggerSnapshot};
use tally_core::domain::validation::{OutputCheck, OutputState, ValidationReport};
use tally_core::dto::notification::NotificationQuery;
use tally_core::dto::task::{
    CashFlowParams, DispatchParams, LatestPipeline, NotificationParams, SegmentationParams,
    TaskParams, ValidationParams, parse_params,
};
use tally_engine::EngineError;
use tally_engine::cashflow::{CashFlowEngine, margin, trend};
use tally_engine::dispatch::{DispatchInput, MessageTransport, dispatch};
use tally_engine::notification::notify;
use tally_engine::pricing::{PricingEngine, build_product_aggregates};
use tally_engine::segmentation::SegmentationEngine;
use tally_engine::threshold::ThresholdEngine;
use thiserror::Error;
use uuid::Uuid;

use crate::repository::{NotificationFilter, ResultQuery, ResultStore, StoreError};
use crate::service::resolver::{DependencyResolver, check_shape};
use crate::service::schema::resolve_schema_version;
use crate::source::{SalesSource, SourceError};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Task {task} failed: {message}")]
    Engine { task: TaskId, message: String },

    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// Drives dependency fallbacks; never returned from `run_task`
    #[error("No usable persisted output for task {0}")]
    UpstreamMissing(TaskId),

    #[error("{0}")]
    NotFound(String),

    #[error("Sales data unavailable: {0}")]
    Source(#[from] SourceError),
}

/// Deployment-wide pipeline settings
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub pipeline_id: String,
    pub schema_dir: PathBuf,
    pub fallback_schema_version: String,
    /// Segment label -> address, overridable per dispatch run
    pub recipients: HashMap<String, String>,
    pub admin_email: String,
}

/// Rows produced by one task run
///
/// The last row is the one returned to the caller.
struct TaskOutput {
    rows: Vec<TaskResult>,
    notifications: Option<Vec<Notification>>,
}

impl TaskOutput {
    fn single(row: TaskResult) -> Self {
        Self {
            rows: vec![row],
            notifications: None,
        }
    }
}

pub struct TaskOrchestrator {
    store: Arc<dyn ResultStore>,
    source: Arc<dyn SalesSource>,
    transport: Arc<dyn MessageTransport>,
    resolver: DependencyResolver,
    settings: PipelineSettings,
    segmentation: SegmentationEngine,
    cashflow: CashFlowEngine,
    pricing: PricingEngine,
    threshold: ThresholdEngine,
}

impl TaskOrchestrator {
    pub fn new(
        store: Arc<dyn ResultStore>,
        source: Arc<dyn SalesSource>,
        transport: Arc<dyn MessageTransport>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            resolver: DependencyResolver::new(store.clone(), settings.pipeline_id.clone()),
            store,
            source,
            transport,
            settings,
            segmentation: SegmentationEngine::default(),
            cashflow: CashFlowEngine::default(),
            pricing: PricingEngine::default(),
            threshold: ThresholdEngine::default(),
        }
    }

    pub fn pipeline_id(&self) -> &str {
        &self.settings.pipeline_id
    }

    /// The schema version new results are written under
    pub async fn schema_version(&self) -> String {
        resolve_schema_version(
            &self.settings.schema_dir,
            &self.settings.pipeline_id,
            &self.settings.fallback_schema_version,
        )
        .await
    }

    /// Run a task and persist its result
    ///
    /// Returns the stored row on success or `no_data`; on failure an `error`
    /// row is stored first and the failure is returned.
    pub async fn run_task(
        &self,
        task_id: TaskId,
        params: TaskParams,
    ) -> Result<TaskResult, TaskError> {
        let run = PipelineRun::new(
            self.settings.pipeline_id.clone(),
            self.schema_version().await,
        );
        tracing::info!(
            "Running task {} under {} with params: {:?}",
            task_id,
            run.schema_version,
            params.keys().collect::<Vec<_>>()
        );

        match self.execute(task_id, &params, &run).await {
            Ok(output) => self.persist(task_id, &run, output).await,
            Err(TaskError::Persistence(e)) => {
                tracing::error!("Task {} could not read stored results: {}", task_id, e);
                Err(TaskError::Persistence(e))
            }
            Err(e) => {
                tracing::error!("Task {} failed: {}", task_id, e);
                let row = TaskResult::new(&run, task_id, TaskStatus::Error, serde_json::json!({}))
                    .with_message(e.to_string());
                if let Err(store_err) = self
                    .store
                    .replace_all(task_id, &run.pipeline_id, vec![row])
                    .await
                {
                    tracing::error!(
                        "Failed to record error for task {}: {}",
                        task_id,
                        store_err
                    );
                }
                Err(e)
            }
        }
    }

    async fn persist(
        &self,
        task_id: TaskId,
        run: &PipelineRun,
        output: TaskOutput,
    ) -> Result<TaskResult, TaskError> {
        let TaskOutput {
            rows,
            notifications,
        } = output;
        let returned = rows.last().cloned().ok_or_else(|| TaskError::Engine {
            task: task_id,
            message: "Task produced no result".to_string(),
        })?;
        let written = rows.len();

        let removed = self
            .store
            .replace_all(task_id, &run.pipeline_id, rows)
            .await?;
        tracing::info!(
            "Task {} stored: removed {} rows, wrote {}",
            task_id,
            removed,
            written
        );

        if let Some(notifications) = notifications {
            let count = notifications.len();
            let removed = self
                .store
                .replace_notifications(&run.pipeline_id, &run.schema_version, notifications)
                .await?;
            tracing::info!("Notifications stored: removed {}, wrote {}", removed, count);
        }

        Ok(returned)
    }

    async fn execute(
        &self,
        task_id: TaskId,
        params: &TaskParams,
        run: &PipelineRun,
    ) -> Result<TaskOutput, TaskError> {
        match task_id {
            TaskId::CashFlow => self.run_cash_flow(parse(params)?, run).await,
            TaskId::Segmentation => self.run_segmentation(parse(params)?, run).await,
            TaskId::PriceOptimization => self.run_price_optimization(run).await,
            TaskId::ThresholdCheck => self.run_threshold_check(run).await,
            TaskId::Validation => self.run_validation(parse(params)?, run).await,
            TaskId::Notification => self.run_notification(parse(params)?, run).await,
            TaskId::Dispatch => self.run_dispatch(parse(params)?, run).await,
        }
    }

    // =========================================================================
    // Tasks
    // =========================================================================

    async fn run_cash_flow(
        &self,
        params: CashFlowParams,
        run: &PipelineRun,
    ) -> Result<TaskOutput, TaskError> {
        let records = self.source.load().await?;
        let result = match self.cashflow.rollup(&records, params.granularity) {
            Ok(result) => result,
            Err(e) => return engine_outcome(TaskId::CashFlow, run, e),
        };

        let mut rows = Vec::with_capacity(result.series.len() + 1);
        let mut details = Vec::with_capacity(result.series.len());
        for series in &result.series {
            let total_sales = series.total_sales();
            let total_profit = series.total_profit();
            let snapshot = CashFlowSnapshot {
                granularity: series.granularity,
                buckets: series.buckets.clone(),
                total_sales,
                total_profit,
                profit_margin: margin(total_sales, total_profit),
                trend: trend(&series.buckets),
            };
            details.push(GranularitySummary {
                granularity: series.granularity,
                data_points: series.buckets.len(),
                total_sales,
                total_profit,
            });
            rows.push(
                success(run, TaskId::CashFlow, &snapshot)?
                    .with_granularity(series.granularity)
                    .with_message(format!("Cash flow rollup for {}", series.granularity)),
            );
        }

        if params.granularity == GranularitySelection::All {
            let summary = CashFlowSummary {
                granularities_processed: result.series.iter().map(|s| s.granularity).collect(),
                detailed_results: details,
                total_records_saved: rows.len(),
                total_sales: result.total_sales,
                total_profit: result.total_profit,
                profit_margin: result.profit_margin,
                trend: result.trend,
            };
            rows.push(
                success(run, TaskId::CashFlow, &summary)?
                    .as_summary()
                    .with_message(format!(
                        "Processed {} granularities",
                        summary.granularities_processed.len()
                    )),
            );
        }

        Ok(TaskOutput {
            rows,
            notifications: None,
        })
    }

    async fn run_segmentation(
        &self,
        params: SegmentationParams,
        run: &PipelineRun,
    ) -> Result<TaskOutput, TaskError> {
        let records = match params.sales_data {
            Some(records) => records,
            None => self.source.load().await?,
        };

        match self.segmentation.segment(
            &records,
            params.n_clusters,
            params.max_preview_size,
            params.include_reports,
        ) {
            Ok(result) => {
                let message = format!(
                    "Segmented {} customers into {} segments",
                    result.customer_count,
                    result.segments.len()
                );
                Ok(TaskOutput::single(
                    success(run, TaskId::Segmentation, &result)?.with_message(message),
                ))
            }
            Err(e) => engine_outcome(TaskId::Segmentation, run, e),
        }
    }

    async fn run_price_optimization(&self, run: &PipelineRun) -> Result<TaskOutput, TaskError> {
        let Some(segmentation) = self.segments_or_live(&run.schema_version).await? else {
            return Ok(TaskOutput::single(no_data(
                run,
                TaskId::PriceOptimization,
                "No segmentation data available for price optimization",
            )));
        };

        let records = match self.source.load().await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Pricing without product data: {}", e);
                Vec::new()
            }
        };
        let products = build_product_aggregates(&records);

        match self
            .pricing
            .optimize(&products, &segmentation.segments, run.timestamp.date_naive())
        {
            Ok(result) => {
                let message = format!(
                    "Generated {} pricing recommendations",
                    result.recommendations.len()
                );
                Ok(TaskOutput::single(
                    success(run, TaskId::PriceOptimization, &result)?.with_message(message),
                ))
            }
            Err(e) => engine_outcome(TaskId::PriceOptimization, run, e),
        }
    }

    async fn run_threshold_check(&self, run: &PipelineRun) -> Result<TaskOutput, TaskError> {
        let version = run.schema_version.as_str();

        // Read before this run replaces it
        let baseline = optional(
            self.resolver
                .load::<ThresholdReport>(TaskId::ThresholdCheck, version)
                .await,
        )?
        .map(|report| report.inputs);

        let segments = self
            .segments_or_live(version)
            .await?
            .map(|s| s.segments)
            .unwrap_or_default();

        let cashflow = match optional(
            self.resolver
                .load::<CashFlowSnapshot>(TaskId::CashFlow, version)
                .await,
        )? {
            Some(snapshot) => Some((snapshot.granularity, snapshot.buckets)),
            None => self.live_monthly_cash_flow().await,
        };
        let (cashflow_granularity, buckets) = match cashflow {
            Some((granularity, buckets)) => (Some(granularity), buckets),
            None => (None, Vec::new()),
        };

        let narrative = optional(
            self.resolver
                .load::<PriceOptimizationResult>(TaskId::PriceOptimization, version)
                .await,
        )?
        .map(|p| p.report);

        // Buckets of different granularities are not comparable
        let historical_cashflow = baseline
            .as_ref()
            .filter(|b| b.cashflow_granularity == cashflow_granularity)
            .map(|b| b.cashflow.as_slice());

        let triggers = self.threshold.evaluate(
            &segments,
            &buckets,
            baseline.as_ref().map(|b| b.segments.as_slice()),
            historical_cashflow,
            narrative.as_deref(),
        );

        let report = ThresholdReport {
            baseline_used: baseline.is_some(),
            triggers,
            inputs: TriggerSnapshot {
                segments,
                cashflow: buckets,
                cashflow_granularity,
            },
        };
        let message = format!("Processed {} triggers", report.triggers.len());
        Ok(TaskOutput::single(
            success(run, TaskId::ThresholdCheck, &report)?.with_message(message),
        ))
    }

    async fn run_validation(
        &self,
        params: ValidationParams,
        run: &PipelineRun,
    ) -> Result<TaskOutput, TaskError> {
        let timestamp = params.timestamp.as_deref().map(parse_timestamp).transpose()?;

        let mut checks = Vec::new();
        for task_id in TaskId::ALL.into_iter().filter(|t| *t != TaskId::Validation) {
            let rows = self
                .store
                .find(&ResultQuery {
                    task_id,
                    pipeline_id: &run.pipeline_id,
                    schema_version: &run.schema_version,
                    timestamp,
                })
                .await?;

            let malformed = rows.iter().map(check_shape).find_map(Result::err);
            let check = match (rows.first(), malformed) {
                (None, _) => OutputCheck {
                    task_id,
                    state: OutputState::Missing,
                    detail: None,
                },
                (Some(_), Some(e)) => OutputCheck {
                    task_id,
                    state: OutputState::Malformed,
                    detail: Some(e.to_string()),
                },
                (Some(latest), None) => OutputCheck {
                    task_id,
                    state: OutputState::Present,
                    detail: Some(format!("{} rows, latest {}", rows.len(), latest.status)),
                },
            };
            checks.push(check);
        }

        let report = ValidationReport {
            timestamp: params.timestamp,
            checks,
        };
        let message = if report.is_complete() {
            "All task outputs present".to_string()
        } else {
            "Some task outputs are missing or malformed".to_string()
        };
        Ok(TaskOutput::single(
            success(run, TaskId::Validation, &report)?.with_message(message),
        ))
    }

    async fn run_notification(
        &self,
        params: NotificationParams,
        run: &PipelineRun,
    ) -> Result<TaskOutput, TaskError> {
        let triggers: Vec<Trigger> = match params.triggers {
            Some(triggers) => triggers,
            None => optional(
                self.resolver
                    .load::<ThresholdReport>(TaskId::ThresholdCheck, &run.schema_version)
                    .await,
            )?
            .map(|report| report.triggers)
            .unwrap_or_default(),
        };

        let notifications = notify(&triggers, run.timestamp);
        let batch = NotificationBatch {
            notifications: notifications.clone(),
        };
        let message = format!("Generated {} notifications", notifications.len());
        Ok(TaskOutput {
            rows: vec![success(run, TaskId::Notification, &batch)?.with_message(message)],
            notifications: Some(notifications),
        })
    }

    async fn run_dispatch(
        &self,
        params: DispatchParams,
        run: &PipelineRun,
    ) -> Result<TaskOutput, TaskError> {
        let version = run.schema_version.as_str();

        let segmentation = self.segments_or_live(version).await?;
        let price = optional(
            self.resolver
                .load::<PriceOptimizationResult>(TaskId::PriceOptimization, version)
                .await,
        )?;
        let notifications = optional(
            self.resolver
                .load::<NotificationBatch>(TaskId::Notification, version)
                .await,
        )?
        .map(|batch| batch.notifications)
        .unwrap_or_default();

        let mut recipients = self.settings.recipients.clone();
        recipients.extend(params.recipients);

        let (segments, reports) = segmentation
            .map(|s| (s.segments, s.reports))
            .unwrap_or_default();

        let input = DispatchInput {
            segments: &segments,
            reports: &reports,
            price_report: price.as_ref().map(|p| p.report.as_str()),
            notifications: &notifications,
            recipients: &recipients,
            admin: &self.settings.admin_email,
        };
        let report = dispatch(self.transport.as_ref(), &input).await;

        let message = format!("Sent {} messages", report.sent_count);
        Ok(TaskOutput::single(
            success(run, TaskId::Dispatch, &report)?.with_message(message),
        ))
    }

    // =========================================================================
    // Dependency fallbacks
    // =========================================================================

    /// Persisted segmentation, else a live run with default parameters
    async fn segments_or_live(
        &self,
        schema_version: &str,
    ) -> Result<Option<SegmentationResult>, TaskError> {
        if let Some(result) = optional(
            self.resolver
                .load::<SegmentationResult>(TaskId::Segmentation, schema_version)
                .await,
        )? {
            return Ok(Some(result));
        }

        tracing::warn!("Recomputing segmentation live");
        let defaults = SegmentationParams::default();
        let records = match self.source.load().await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Live segmentation unavailable: {}", e);
                return Ok(None);
            }
        };

        match self.segmentation.segment(
            &records,
            defaults.n_clusters,
            defaults.max_preview_size,
            defaults.include_reports,
        ) {
            Ok(result) => Ok(Some(result)),
            Err(e) => {
                tracing::warn!("Live segmentation failed: {}", e);
                Ok(None)
            }
        }
    }

    async fn live_monthly_cash_flow(&self) -> Option<(Granularity, Vec<CashFlowBucket>)> {
        tracing::warn!("Recomputing monthly cash flow live");
        let records: Vec<SalesRecord> = match self.source.load().await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Live cash flow unavailable: {}", e);
                return None;
            }
        };

        let selection = GranularitySelection::Only(Granularity::Monthly);
        match self.cashflow.rollup(&records, selection) {
            Ok(result) => result
                .series
                .into_iter()
                .next()
                .map(|s| (s.granularity, s.buckets)),
            Err(e) => {
                tracing::warn!("Live cash flow failed: {}", e);
                None
            }
        }
    }

    // =========================================================================
    // Retrieval
    // =========================================================================

    /// Stored rows for a task under the active schema version, newest first
    pub async fn task_results(
        &self,
        task_id: TaskId,
        timestamp: Option<&str>,
    ) -> Result<Vec<TaskResult>, TaskError> {
        let timestamp = timestamp.map(parse_timestamp).transpose()?;
        let schema_version = self.schema_version().await;

        let rows = self
            .store
            .find(&ResultQuery {
                task_id,
                pipeline_id: &self.settings.pipeline_id,
                schema_version: &schema_version,
                timestamp,
            })
            .await?;

        if rows.is_empty() {
            return Err(TaskError::NotFound(format!(
                "No results for task {} under {}",
                task_id, schema_version
            )));
        }
        Ok(rows)
    }

    pub async fn latest_pipeline(&self) -> Result<LatestPipeline, TaskError> {
        let latest = self.store.latest(&self.settings.pipeline_id).await?;
        Ok(match latest {
            Some(row) => LatestPipeline {
                schema_version: row.schema_version,
                timestamp: Some(row.timestamp),
            },
            None => LatestPipeline {
                schema_version: self.schema_version().await,
                timestamp: None,
            },
        })
    }

    pub async fn list_notifications(
        &self,
        query: &NotificationQuery,
    ) -> Result<Vec<Notification>, TaskError> {
        let timestamp = query.timestamp.as_deref().map(parse_timestamp).transpose()?;
        let schema_version = self.schema_version().await;

        Ok(self
            .store
            .list_notifications(&NotificationFilter {
                pipeline_id: &self.settings.pipeline_id,
                schema_version: &schema_version,
                timestamp,
                read: query.read,
            })
            .await?)
    }

    pub async fn mark_notification_read(&self, id: Uuid) -> Result<(), TaskError> {
        let schema_version = self.schema_version().await;
        let updated = self
            .store
            .mark_notification_read(&self.settings.pipeline_id, &schema_version, id)
            .await?;

        if updated {
            tracing::info!("Notification {} marked as read", id);
            Ok(())
        } else {
            Err(TaskError::NotFound(format!("Notification {} not found", id)))
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn parse<T: serde::de::DeserializeOwned>(params: &TaskParams) -> Result<T, TaskError> {
    parse_params(params).map_err(TaskError::Validation)
}

/// Parse a `YYYY-MM-DD_HH:MM` run timestamp
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, TaskError> {
    NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
        .map(|t| t.and_utc())
        .map_err(|_| {
            TaskError::Validation(format!(
                "Invalid timestamp '{}' (expected YYYY-MM-DD_HH:MM)",
                raw
            ))
        })
}

/// Treat a missing dependency as absent, keeping every other failure
fn optional<T>(loaded: Result<T, TaskError>) -> Result<Option<T>, TaskError> {
    match loaded {
        Ok(value) => Ok(Some(value)),
        Err(TaskError::UpstreamMissing(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

fn success<T: Serialize>(
    run: &PipelineRun,
    task_id: TaskId,
    payload: &T,
) -> Result<TaskResult, TaskError> {
    let payload = serde_json::to_value(payload).map_err(StoreError::from)?;
    Ok(TaskResult::new(run, task_id, TaskStatus::Success, payload))
}

fn no_data(run: &PipelineRun, task_id: TaskId, message: &str) -> TaskResult {
    TaskResult::new(run, task_id, TaskStatus::NoData, serde_json::json!({})).with_message(message)
}

/// `NoData` becomes a stored `no_data` row; anything else is a failure
fn engine_outcome(
    task_id: TaskId,
    run: &PipelineRun,
    error: EngineError,
) -> Result<TaskOutput, TaskError> {
    match error {
        EngineError::NoData(message) => {
            tracing::info!("Task {} has no data: {}", task_id, message);
            Ok(TaskOutput::single(no_data(run, task_id, &message)))
        }
        EngineError::Validation(message) => Err(TaskError::Validation(message)),
        EngineError::Strategy(message) => Err(TaskError::Engine {
            task: task_id,
            message,
        }),
    }
}
