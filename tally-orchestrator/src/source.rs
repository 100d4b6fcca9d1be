//! Sales data source
//!
//! The orchestrator reads sales records through [`SalesSource`]; the shipped
//! source loads a JSON array of records from disk on every call.

use async_trait::async_trait;
use std::path::PathBuf;
use tally_core::domain::sales::SalesRecord;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid sales data in {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

#[async_trait]
pub trait SalesSource: Send + Sync {
    async fn load(&self) -> Result<Vec<SalesRecord>, SourceError>;
}

/// Reads a JSON array of sales records
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SalesSource for JsonFileSource {
    async fn load(&self) -> Result<Vec<SalesRecord>, SourceError> {
        let path = self.path.display().to_string();
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| SourceError::Io {
                path: path.clone(),
                source,
            })?;
        let records: Vec<SalesRecord> =
            serde_json::from_str(&raw).map_err(|source| SourceError::Parse { path, source })?;

        tracing::debug!("Loaded {} sales records from {}", records.len(), self.path.display());
        Ok(records)
    }
}

/// Fixed in-memory records
#[cfg(test)]
pub struct StaticSource(pub Vec<SalesRecord>);

#[cfg(test)]
#[async_trait]
impl SalesSource for StaticSource {
    async fn load(&self) -> Result<Vec<SalesRecord>, SourceError> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_json_file_source_accepts_export_columns() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"Customer ID": "CG-12520", "Order Date": "11/8/2016", "Sales": 261.96, "Category": "Furniture"}},
                {{"customer_id": "DV-13045", "order_date": "2016-06-12", "sales": 14.62}}
            ]"#
        )
        .unwrap();

        let records = JsonFileSource::new(file.path()).load().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].customer_id.as_deref(), Some("CG-12520"));
        assert!(records[0].order_date.is_some());
        assert_eq!(records[1].sales, Some(14.62));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = JsonFileSource::new(dir.path().join("absent.json"))
            .load()
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Io { .. }));
    }
}
