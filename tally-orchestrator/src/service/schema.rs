//! Schema version resolution
//!
//! Schema definitions are JSON files named `<pipeline_id>*.json`, each with
//! a top-level `schema_version` string. The active version is the
//! lexicographically greatest one found. Resolution never fails: any problem
//! falls back to the configured version.

use std::path::Path;

pub async fn resolve_schema_version(dir: &Path, pipeline_id: &str, fallback: &str) -> String {
    match scan(dir, pipeline_id).await {
        Ok(Some(version)) => version,
        Ok(None) => {
            tracing::warn!(
                "No schema definitions for {} in {}, using {}",
                pipeline_id,
                dir.display(),
                fallback
            );
            fallback.to_string()
        }
        Err(e) => {
            tracing::warn!(
                "Schema version resolution failed in {}: {}, using {}",
                dir.display(),
                e,
                fallback
            );
            fallback.to_string()
        }
    }
}

async fn scan(dir: &Path, pipeline_id: &str) -> std::io::Result<Option<String>> {
    let mut best: Option<String> = None;

    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.starts_with(pipeline_id) || !name.ends_with(".json") {
            continue;
        }

        let version = tokio::fs::read_to_string(&path)
            .await
            .ok()
            .and_then(|raw| serde_json::from_str::<serde_json::Value>(&raw).ok())
            .and_then(|schema| schema.get("schema_version")?.as_str().map(str::to_string));

        match version {
            Some(version) if best.as_ref().is_none_or(|b| version > *b) => best = Some(version),
            Some(_) => {}
            None => tracing::debug!("Skipping {} without a schema_version", path.display()),
        }
    }

    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(name), body).unwrap();
    }

    #[tokio::test]
    async fn test_picks_greatest_version() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "AgentBI-Demo_a.json", r#"{"schema_version": "v0.6.2"}"#);
        write(dir.path(), "AgentBI-Demo_b.json", r#"{"schema_version": "v0.7.0"}"#);
        write(dir.path(), "Other.json", r#"{"schema_version": "v9.9.9"}"#);
        write(dir.path(), "AgentBI-Demo_c.json", "not json");

        assert_eq!(
            resolve_schema_version(dir.path(), "AgentBI-Demo", "v0.0.1").await,
            "v0.7.0"
        );
    }

    #[tokio::test]
    async fn test_falls_back_without_definitions() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            resolve_schema_version(dir.path(), "AgentBI-Demo", "v0.6.2").await,
            "v0.6.2"
        );
    }

    #[tokio::test]
    async fn test_falls_back_on_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            resolve_schema_version(&dir.path().join("absent"), "AgentBI-Demo", "v0.6.2").await,
            "v0.6.2"
        );
    }
}
