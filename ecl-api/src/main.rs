//! ECL API Server Entry Point
//!
//! Bootstraps logging and configuration, builds the summary service for the
//! configured store and cache, optionally seeds the sample portfolio and
//! starts the Axum HTTP server.

use std::net::SocketAddr;

use axum::Router;
use ecl_api::{
    build_summary_service, create_api_router, init_tracer, seed_sample_portfolio, ApiConfig,
    ApiError, ApiResult, DbConfig, SeedOptions, TelemetryConfig,
};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracer(&telemetry_config)?;

    let api_config = ApiConfig::from_env();
    api_config.validate()?;
    let db_config = DbConfig::from_env();

    tracing::info!(
        exposure_store = ?api_config.exposure_store,
        cache_backend = ?api_config.cache_backend,
        cache_enabled = api_config.ecl.cache_enabled,
        cache_ttl_secs = api_config.ecl.cache_ttl.as_secs(),
        metrics_enabled = api_config.metrics_enabled,
        "Loaded configuration"
    );

    let summaries = build_summary_service(&api_config, &db_config).await?;

    if api_config.seed_sample_data {
        let options = SeedOptions::from_env()?;
        seed_sample_portfolio(summaries.as_ref(), &options).await?;
    }

    let app: Router = create_api_router(summaries, &api_config);

    let addr = resolve_bind_addr()?;
    tracing::info!(%addr, "Starting ECL API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}

fn resolve_bind_addr() -> ApiResult<SocketAddr> {
    let host = std::env::var("ECL_API_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port_str = std::env::var("PORT")
        .ok()
        .or_else(|| std::env::var("ECL_API_PORT").ok())
        .unwrap_or_else(|| "3000".to_string());
    let port = port_str
        .parse::<u16>()
        .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", port_str)))?;

    let addr = format!("{}:{}", host, port);
    addr.parse::<SocketAddr>()
        .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
}
