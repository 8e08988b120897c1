use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use file_service::config::Config;
use file_service::db::PgRepository;
use file_service::storage::build_object_store;
use file_service::{build_router, workers, AppState};
use shared::observability::{init_logging, LogConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_logging(LogConfig::from_env("file-service"))?;

    info!("Starting File Service...");

    // Load configuration
    let config = Config::from_env()?;
    config.validate()?;
    info!(
        storage_backend = config.storage.backend.as_str(),
        max_upload_bytes = config.upload.max_bytes,
        "Configuration loaded successfully"
    );

    // Initialize database connection pool
    let db_pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;
    info!("Database connection pool established");

    // Run migrations
    sqlx::migrate!("./migrations").run(&db_pool).await?;
    info!("Database migrations completed");

    let repository = Arc::new(PgRepository::new(db_pool));

    let store = build_object_store(&config.storage)?;
    match store.health_check().await {
        Ok(()) => info!("Object store reachable: backend={}", store.backend_name()),
        Err(e) => warn!(
            "Object store health check failed, continuing: backend={}, error={}",
            store.backend_name(),
            e
        ),
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let sweeper_config = config.sweeper.clone();

    // Build application state
    let app_state = Arc::new(AppState::new(config, repository, store));

    // Start background workers
    let file_service = app_state.file_service.clone();
    tokio::spawn(async move {
        if let Err(e) = workers::expiry_sweeper::start(file_service, sweeper_config).await {
            tracing::error!("Expiry sweeper stopped: {}", e);
        }
    });

    let app = build_router(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("File Service listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
