use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Task results; seq orders rows written within the same minute
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS task_results (
            seq BIGSERIAL PRIMARY KEY,
            id UUID NOT NULL UNIQUE,
            task_id SMALLINT NOT NULL,
            status VARCHAR(20) NOT NULL,
            payload JSONB NOT NULL DEFAULT '{}',
            message TEXT,
            pipeline_id VARCHAR(255) NOT NULL,
            schema_version VARCHAR(64) NOT NULL,
            granularity VARCHAR(20),
            summary BOOLEAN NOT NULL DEFAULT FALSE,
            timestamp TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notifications (
            seq BIGSERIAL PRIMARY KEY,
            id UUID NOT NULL UNIQUE,
            pipeline_id VARCHAR(255) NOT NULL,
            schema_version VARCHAR(64) NOT NULL,
            body JSONB NOT NULL,
            read BOOLEAN NOT NULL DEFAULT FALSE,
            timestamp TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_task_results_key ON task_results(pipeline_id, task_id, schema_version, timestamp DESC)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_task_results_latest ON task_results(pipeline_id, timestamp DESC)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_notifications_key ON notifications(pipeline_id, schema_version, timestamp DESC)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
