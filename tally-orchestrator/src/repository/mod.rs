//! Repository Module
//!
//! The result store behind the orchestrator. It is addressed by
//! `(task_id, pipeline_id, schema_version)` and only needs insert, filtered
//! delete and newest-first lookup, so the same trait is served by an
//! in-memory implementation and by PostgreSQL.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgResultStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tally_core::domain::notification::Notification;
use tally_core::domain::task::{TaskId, TaskResult};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

/// Selects task result rows
#[derive(Debug, Clone)]
pub struct ResultQuery<'a> {
    pub task_id: TaskId,
    pub pipeline_id: &'a str,
    pub schema_version: &'a str,
    /// Exact run timestamp (minute resolution)
    pub timestamp: Option<DateTime<Utc>>,
}

/// Selects notifications
#[derive(Debug, Clone)]
pub struct NotificationFilter<'a> {
    pub pipeline_id: &'a str,
    pub schema_version: &'a str,
    pub timestamp: Option<DateTime<Utc>>,
    pub read: Option<bool>,
}

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Atomically replace every row for `(task_id, pipeline_id)` with `rows`
    ///
    /// Readers see either the old rows or the new ones, never neither.
    /// Returns the number of rows removed.
    async fn replace_all(
        &self,
        task_id: TaskId,
        pipeline_id: &str,
        rows: Vec<TaskResult>,
    ) -> Result<u64, StoreError>;

    /// Matching rows, newest first
    async fn find(&self, query: &ResultQuery<'_>) -> Result<Vec<TaskResult>, StoreError>;

    /// The most recently written row for the pipeline, across all tasks
    async fn latest(&self, pipeline_id: &str) -> Result<Option<TaskResult>, StoreError>;

    /// Atomically replace every notification stored for the pipeline
    async fn replace_notifications(
        &self,
        pipeline_id: &str,
        schema_version: &str,
        notifications: Vec<Notification>,
    ) -> Result<u64, StoreError>;

    /// Matching notifications, newest first
    async fn list_notifications(
        &self,
        filter: &NotificationFilter<'_>,
    ) -> Result<Vec<Notification>, StoreError>;

    /// Flag a notification as read; false when no such notification exists
    async fn mark_notification_read(
        &self,
        pipeline_id: &str,
        schema_version: &str,
        id: Uuid,
    ) -> Result<bool, StoreError>;
}
