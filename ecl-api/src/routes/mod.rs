//! REST API Routes Module
//!
//! Includes:
//! - Impairment routes (threshold summary, exposure writes, cache clearing)
//! - Health check endpoints (Kubernetes-compatible)
//! - Prometheus metrics and the OpenAPI document
//! - CORS support for browser-based clients

pub mod health;
pub mod impairment;

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::config::ApiConfig;
use crate::openapi::ApiDoc;
use crate::services::SharedSummaryService;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware, MetricsRecorder};

pub use health::create_router as health_router;
pub use impairment::create_router as impairment_router;

/// Mount point of the impairment routes.
pub const IMPAIRMENT_BASE: &str = "/api/impairment/ecl";

// ============================================================================
// OPENAPI ENDPOINTS
// ============================================================================

/// Handler for /openapi.json endpoint.
async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from ApiConfig.
///
/// In development mode (empty origins), allows all origins.
/// In production mode, only allows configured origins.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([impairment::CACHE_STATUS_HEADER])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any)
    } else {
        tracing::info!(
            "CORS: Production mode - allowing origins: {:?}",
            config.cors_origins
        );
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the complete API router.
///
/// - Impairment routes under `/api/impairment/ecl/*`
/// - Health checks at `/health/*`
/// - Metrics at `/metrics`, unless disabled
/// - OpenAPI spec at `/openapi.json`
///
/// Execution order: CORS -> HTTP trace -> Observability -> Handler
pub fn create_api_router(summaries: SharedSummaryService, api_config: &ApiConfig) -> Router {
    let metrics = MetricsRecorder::new(api_config.metrics_enabled);
    let state = AppState::new(summaries, metrics);

    let mut router = Router::new()
        .nest(IMPAIRMENT_BASE, impairment::create_router())
        .nest("/health", health::create_router())
        .route("/openapi.json", get(openapi_json));
    if metrics.is_enabled() {
        router = router.route("/metrics", get(metrics_handler));
    }

    router
        .layer(from_fn_with_state(metrics, observability_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(api_config))
        .with_state(state)
}
