//! ScriptForge Service - HTTP API for script generation and subscriptions
//!
//! This is the main entry point for the scriptforge service.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scriptforge_service::rate_limit::spawn_sweeper;
use scriptforge_service::{create_router, expose_internal_errors, AppState, ServiceConfig};
use scriptforge_store::Store;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,scriptforge=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting ScriptForge Service");

    // Load configuration from environment
    let config = ServiceConfig::from_env();
    expose_internal_errors(config.is_development());

    tracing::info!(
        listen_addr = %config.listen_addr,
        environment = ?config.environment,
        data_dir = %config.data_dir,
        llm_configured = %config.llm.api_key.is_some(),
        stripe_configured = %config.stripe_api_key.is_some(),
        admin_emails = config.admin_emails.len(),
        "Service configuration loaded"
    );

    let store = open_store(&config)?;

    // Build app state
    let state = AppState::new(store, config.clone());
    let sweeper = spawn_sweeper(
        state.rate_limiter.clone(),
        Duration::from_secs(config.rate_limit_window_seconds.max(1)),
    );

    // Create the router
    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    sweeper.abort();
    Ok(())
}

#[cfg(feature = "rocksdb-backend")]
fn open_store(config: &ServiceConfig) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    tracing::info!(path = %config.data_dir, "Opening RocksDB store");
    let store: Arc<dyn Store> = Arc::new(scriptforge_store::RocksStore::open(&config.data_dir)?);
    Ok(store)
}

#[cfg(not(feature = "rocksdb-backend"))]
fn open_store(config: &ServiceConfig) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    tracing::warn!(
        data_dir = %config.data_dir,
        "Built without rocksdb-backend; using in-memory store (data is lost on restart)"
    );
    let store: Arc<dyn Store> = Arc::new(scriptforge_store::MemoryStore::new());
    Ok(store)
}
