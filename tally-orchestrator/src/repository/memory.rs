//! In-memory result store
//!
//! Used when no database is configured and by tests. Each replace happens
//! under a single write lock, so readers never observe a partial rerun.

use async_trait::async_trait;
use tally_core::domain::notification::Notification;
use tally_core::domain::task::{TaskId, TaskResult};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{NotificationFilter, ResultQuery, ResultStore, StoreError};

#[derive(Debug, Clone)]
struct StoredNotification {
    pipeline_id: String,
    schema_version: String,
    notification: Notification,
}

#[derive(Debug, Default)]
struct Tables {
    /// Insertion order is preserved; later entries are newer
    results: Vec<TaskResult>,
    notifications: Vec<StoredNotification>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Newest first: latest timestamp, then latest insertion
fn newest_first<T: Clone>(
    mut rows: Vec<(usize, &T)>,
    timestamp: impl Fn(&T) -> chrono::DateTime<chrono::Utc>,
) -> Vec<T> {
    rows.sort_by(|a, b| timestamp(b.1).cmp(&timestamp(a.1)).then(b.0.cmp(&a.0)));
    rows.into_iter().map(|(_, row)| row.clone()).collect()
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn replace_all(
        &self,
        task_id: TaskId,
        pipeline_id: &str,
        rows: Vec<TaskResult>,
    ) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.results.len();
        tables
            .results
            .retain(|r| !(r.task_id == task_id && r.pipeline_id == pipeline_id));
        let removed = (before - tables.results.len()) as u64;
        tables.results.extend(rows);
        Ok(removed)
    }

    async fn find(&self, query: &ResultQuery<'_>) -> Result<Vec<TaskResult>, StoreError> {
        let tables = self.tables.read().await;
        let matching = tables
            .results
            .iter()
            .enumerate()
            .filter(|(_, r)| {
                r.task_id == query.task_id
                    && r.pipeline_id == query.pipeline_id
                    && r.schema_version == query.schema_version
                    && query.timestamp.is_none_or(|t| r.timestamp == t)
            })
            .collect();
        Ok(newest_first(matching, |r| r.timestamp))
    }

    async fn latest(&self, pipeline_id: &str) -> Result<Option<TaskResult>, StoreError> {
        let tables = self.tables.read().await;
        let matching = tables
            .results
            .iter()
            .enumerate()
            .filter(|(_, r)| r.pipeline_id == pipeline_id)
            .collect();
        Ok(newest_first(matching, |r| r.timestamp).into_iter().next())
    }

    async fn replace_notifications(
        &self,
        pipeline_id: &str,
        schema_version: &str,
        notifications: Vec<Notification>,
    ) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.notifications.len();
        tables.notifications.retain(|n| n.pipeline_id != pipeline_id);
        let removed = (before - tables.notifications.len()) as u64;
        tables
            .notifications
            .extend(notifications.into_iter().map(|notification| StoredNotification {
                pipeline_id: pipeline_id.to_string(),
                schema_version: schema_version.to_string(),
                notification,
            }));
        Ok(removed)
    }

    async fn list_notifications(
        &self,
        filter: &NotificationFilter<'_>,
    ) -> Result<Vec<Notification>, StoreError> {
        let tables = self.tables.read().await;
        let matching = tables
            .notifications
            .iter()
            .filter(|s| {
                s.pipeline_id == filter.pipeline_id && s.schema_version == filter.schema_version
            })
            .map(|s| &s.notification)
            .filter(|n| {
                filter.timestamp.is_none_or(|t| n.timestamp == t)
                    && filter.read.is_none_or(|read| n.read == read)
            })
            .enumerate()
            .collect();
        Ok(newest_first(matching, |n| n.timestamp))
    }

    async fn mark_notification_read(
        &self,
        pipeline_id: &str,
        schema_version: &str,
        id: Uuid,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let found = tables.notifications.iter_mut().find(|s| {
            s.pipeline_id == pipeline_id
                && s.schema_version == schema_version
                && s.notification.id == id
        });
        match found {
            Some(stored) => {
                stored.notification.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
