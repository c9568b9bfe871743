// src/main.rs

use quiz_backend::blob::{BlobStore, LocalBlobStore};
use quiz_backend::config::Config;
use quiz_backend::routes;
use quiz_backend::state::AppState;
use quiz_backend::store::{MemoryStore, PgStore, RemoteStore};
use dotenvy::dotenv;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let store: Arc<dyn RemoteStore> = match &config.database_url {
        Some(database_url) => Arc::new(connect_postgres(database_url).await),
        None => {
            tracing::warn!("DATABASE_URL not set, keeping all data in memory");
            Arc::new(MemoryStore::new())
        }
    };

    tokio::fs::create_dir_all(&config.blob_dir)
        .await
        .expect("Failed to create blob directory");
    let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(
        config.blob_dir.clone(),
        config.public_base_url.clone(),
    ));

    // Create AppState
    let state = AppState::new(config.clone(), store, blobs);

    // Seed Quiz Catalog
    if let Some(path) = &config.catalog_seed_file {
        if let Err(e) = seed_catalog(&state, path).await {
            tracing::error!("Failed to seed quiz catalog: {}", e);
        }
    }

    if let Err(e) = state.catalog.start().await {
        tracing::error!("Failed to subscribe to quiz catalog: {}", e);
    }

    state.spawn_housekeeping();

    // Create the Axum application router
    let app = routes::create_router(state);

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await.unwrap();

    // Start the server
    axum::serve(listener, app).await.unwrap();
}

/// Connects with retry, then applies migrations.
async fn connect_postgres(database_url: &str) -> PgStore {
    let mut retry_count = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    panic!("Failed to connect to database after 5 retries: {}", e);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };

    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    let store = PgStore::new(pool);
    store
        .migrate()
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations applied successfully.");

    store
}

async fn seed_catalog(
    state: &AppState,
    path: &std::path::Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let raw = tokio::fs::read_to_string(path).await?;
    let catalog: Value = serde_json::from_str(&raw)?;
    if !state.catalog.seed_if_empty(catalog).await? {
        tracing::info!("Quiz catalog already present, skipping seed");
    }
    Ok(())
}
