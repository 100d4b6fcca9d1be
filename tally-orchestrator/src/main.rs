use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod db;
pub mod repository;
pub mod service;
pub mod source;
pub mod transport;

use config::Config;
use repository::{MemoryStore, PgResultStore, ResultStore};
use service::TaskOrchestrator;
use source::JsonFileSource;
use transport::LogTransport;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tally_orchestrator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Tally Orchestrator...");

    let config = Config::from_env().expect("Failed to load configuration");
    config.validate().expect("Invalid configuration");

    let store: Arc<dyn ResultStore> = match &config.database_url {
        Some(database_url) => {
            tracing::info!("Connecting to database...");

            let pool = db::create_pool(database_url)
                .await
                .expect("Failed to create database pool");

            tracing::info!("Database connection pool created");

            db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");

            Arc::new(PgResultStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, results are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let recipients = config
        .load_recipients()
        .expect("Failed to load recipients");

    let orchestrator = Arc::new(TaskOrchestrator::new(
        store,
        Arc::new(JsonFileSource::new(config.sales_data.clone())),
        Arc::new(LogTransport),
        config.pipeline_settings(recipients),
    ));

    tracing::info!(
        "Pipeline {} using schema version {}",
        orchestrator.pipeline_id(),
        orchestrator.schema_version().await
    );

    // Build router with all API endpoints
    let app = api::create_router(orchestrator);

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
