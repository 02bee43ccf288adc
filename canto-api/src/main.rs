//! Canto API Server Entry Point
//!
//! Bootstraps telemetry and configuration, opens the histogram store, and
//! starts the Axum HTTP server.

use canto_api::telemetry::{init_tracer, shutdown_tracer, TelemetryConfig};
use canto_api::{create_api_router, ApiConfig, ApiError, ApiResult, AppState};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    let provider = init_tracer(&telemetry_config)?;

    let result = run().await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "Server exited with error");
    }

    shutdown_tracer(&provider);
    result
}

async fn run() -> ApiResult<()> {
    let config = ApiConfig::from_env()?;
    let addr = config.bind_addr()?;

    let state = AppState::from_config(&config).await?;
    let app = create_api_router(state.clone());

    tracing::info!(%addr, backend = %config.store_backend, "Starting Canto API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    state.shutdown().await;
    tracing::info!("Histogram store closed");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
