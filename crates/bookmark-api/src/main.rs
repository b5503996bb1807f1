//! bookmark-api server binary.

use std::net::SocketAddr;

use tracing::info;

use bookmark_api::config::ServerConfig;
use bookmark_api::telemetry::{self, LogConfig};
use bookmark_api::{build_router, AppState};
use bookmark_core::Paginator;
use bookmark_db::{log_pool_metrics, Database};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let log_config = LogConfig::from_env();
    let _log_guard = telemetry::init(&log_config);
    info!(
        log_format = ?log_config.format,
        log_file = %log_config.destination(),
        "Logging initialized"
    );

    let config = ServerConfig::from_env()?;
    info!(
        host = %config.host,
        port = config.port,
        default_page_size = config.pagination.default_page_size,
        max_page_size = config.pagination.max_page_size,
        total_count = ?config.pagination.total_count,
        "Configuration loaded"
    );

    let db = Database::connect_with_config(&config.database_url, config.pool.clone()).await?;
    log_pool_metrics(&db.pool);

    if config.run_migrations {
        db.migrate().await?;
    }

    let app = build_router(AppState::new(
        db.repository(),
        Paginator::new(config.pagination),
    ));

    let addr: SocketAddr = config.bind_addr().parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.pool.close().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
