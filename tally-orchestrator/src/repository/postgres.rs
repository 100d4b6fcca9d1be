//! PostgreSQL result store
//!
//! Replaces run inside one transaction, so a rerun's delete and insert
//! commit together.

use async_trait::async_trait;
use sqlx::PgPool;
use tally_core::domain::cashflow::Granularity;
use tally_core::domain::notification::Notification;
use tally_core::domain::task::{TaskId, TaskResult, TaskStatus};
use uuid::Uuid;

use super::{NotificationFilter, ResultQuery, ResultStore, StoreError};

const RESULT_COLUMNS: &str = "id, task_id, status, payload, message, pipeline_id, \
                              schema_version, granularity, summary, timestamp";

pub struct PgResultStore {
    pool: PgPool,
}

impl PgResultStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResultStore for PgResultStore {
    async fn replace_all(
        &self,
        task_id: TaskId,
        pipeline_id: &str,
        rows: Vec<TaskResult>,
    ) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;

        let removed =
            sqlx::query("DELETE FROM task_results WHERE task_id = $1 AND pipeline_id = $2")
                .bind(task_id.number() as i16)
                .bind(pipeline_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();

        for row in &rows {
            sqlx::query(
                r#"
                INSERT INTO task_results
                    (id, task_id, status, payload, message, pipeline_id,
                     schema_version, granularity, summary, timestamp)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(row.id)
            .bind(row.task_id.number() as i16)
            .bind(row.status.as_str())
            .bind(&row.payload)
            .bind(&row.message)
            .bind(&row.pipeline_id)
            .bind(&row.schema_version)
            .bind(row.granularity.map(Granularity::as_str))
            .bind(row.summary)
            .bind(row.timestamp)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(removed)
    }

    async fn find(&self, query: &ResultQuery<'_>) -> Result<Vec<TaskResult>, StoreError> {
        let rows = sqlx::query_as::<_, TaskResultRow>(&format!(
            r#"
            SELECT {RESULT_COLUMNS}
            FROM task_results
            WHERE task_id = $1 AND pipeline_id = $2 AND schema_version = $3
              AND ($4::timestamptz IS NULL OR timestamp = $4)
            ORDER BY timestamp DESC, seq DESC
            "#
        ))
        .bind(query.task_id.number() as i16)
        .bind(query.pipeline_id)
        .bind(query.schema_version)
        .bind(query.timestamp)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TaskResult::try_from).collect()
    }

    async fn latest(&self, pipeline_id: &str) -> Result<Option<TaskResult>, StoreError> {
        let row = sqlx::query_as::<_, TaskResultRow>(&format!(
            r#"
            SELECT {RESULT_COLUMNS}
            FROM task_results
            WHERE pipeline_id = $1
            ORDER BY timestamp DESC, seq DESC
            LIMIT 1
            "#
        ))
        .bind(pipeline_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TaskResult::try_from).transpose()
    }

    async fn replace_notifications(
        &self,
        pipeline_id: &str,
        schema_version: &str,
        notifications: Vec<Notification>,
    ) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM notifications WHERE pipeline_id = $1")
            .bind(pipeline_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        for notification in &notifications {
            sqlx::query(
                r#"
                INSERT INTO notifications (id, pipeline_id, schema_version, body, read, timestamp)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(notification.id)
            .bind(pipeline_id)
            .bind(schema_version)
            .bind(serde_json::to_value(notification)?)
            .bind(notification.read)
            .bind(notification.timestamp)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(removed)
    }

    async fn list_notifications(
        &self,
        filter: &NotificationFilter<'_>,
    ) -> Result<Vec<Notification>, StoreError> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT body, read
            FROM notifications
            WHERE pipeline_id = $1 AND schema_version = $2
              AND ($3::timestamptz IS NULL OR timestamp = $3)
              AND ($4::boolean IS NULL OR read = $4)
            ORDER BY timestamp DESC, seq DESC
            "#,
        )
        .bind(filter.pipeline_id)
        .bind(filter.schema_version)
        .bind(filter.timestamp)
        .bind(filter.read)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Notification::try_from).collect()
    }

    async fn mark_notification_read(
        &self,
        pipeline_id: &str,
        schema_version: &str,
        id: Uuid,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET read = TRUE
            WHERE id = $1 AND pipeline_id = $2 AND schema_version = $3
            "#,
        )
        .bind(id)
        .bind(pipeline_id)
        .bind(schema_version)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct TaskResultRow {
    id: Uuid,
    task_id: i16,
    status: String,
    payload: serde_json::Value,
    message: Option<String>,
    pipeline_id: String,
    schema_version: String,
    granularity: Option<String>,
    summary: bool,
    timestamp: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<TaskResultRow> for TaskResult {
    type Error = StoreError;

    fn try_from(row: TaskResultRow) -> Result<Self, Self::Error> {
        let task_id = u8::try_from(row.task_id)
            .map_err(|_| StoreError::Corrupt(format!("task_id {}", row.task_id)))
            .and_then(|n| TaskId::try_from(n).map_err(StoreError::Corrupt))?;
        let status = TaskStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Corrupt(format!("status {}", row.status)))?;
        let granularity = row
            .granularity
            .map(|g| {
                Granularity::parse(&g)
                    .ok_or_else(|| StoreError::Corrupt(format!("granularity {}", g)))
            })
            .transpose()?;

        Ok(TaskResult {
            id: row.id,
            task_id,
            status,
            payload: row.payload,
            message: row.message,
            pipeline_id: row.pipeline_id,
            schema_version: row.schema_version,
            granularity,
            summary: row.summary,
            timestamp: row.timestamp,
        })
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    body: serde_json::Value,
    read: bool,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = StoreError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        let mut notification: Notification = serde_json::from_value(row.body)?;
        // the column is authoritative; the body keeps the value at creation
        notification.read = row.read;
        Ok(notification)
    }
}
