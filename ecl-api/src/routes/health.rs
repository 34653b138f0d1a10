//! Health Check Endpoints
//!
//! - `/health/ping` answers `pong`
//! - `/health/live` reports the process as alive
//! - `/health/ready` probes the exposure store and the summary cache
//!
//! A broken summary cache only degrades readiness: summaries are still
//! computed from the exposure store, just without caching.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Instant;

use crate::services::SharedSummaryService;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// Serving, but without the summary cache.
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    fn http_status(self) -> StatusCode {
        match self {
            HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Per-component probe results for `/health/ready`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthDetails {
    pub exposure_store: ComponentHealth,
    /// Absent when caching is disabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_cache: Option<ComponentHealth>,
    pub cache_enabled: bool,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentHealth {
    /// Time a probe; a failure marks the component with `on_failure`.
    async fn probe<F, T, E>(probe: F, on_failure: HealthStatus) -> Self
    where
        F: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let start = Instant::now();
        match probe.await {
            Ok(_) => Self {
                status: HealthStatus::Healthy,
                latency_ms: Some(start.elapsed().as_millis() as u64),
                error: None,
            },
            Err(e) => Self {
                status: on_failure,
                latency_ms: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Overall status: an unhealthy store wins, then a degraded cache.
fn overall_status(store: &ComponentHealth, cache: Option<&ComponentHealth>) -> HealthStatus {
    match (store.status, cache.map(|c| c.status)) {
        (HealthStatus::Unhealthy, _) => HealthStatus::Unhealthy,
        (_, Some(HealthStatus::Degraded | HealthStatus::Unhealthy)) => HealthStatus::Degraded,
        _ => HealthStatus::Healthy,
    }
}

#[utoipa::path(
    get,
    path = "/health/ping",
    tag = "Health",
    responses(
        (status = 200, description = "Service is responding", body = String),
    ),
)]
pub async fn ping() -> impl IntoResponse {
    (StatusCode::OK, "pong")
}

#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Process is alive", body = HealthResponse),
    ),
)]
pub async fn liveness() -> impl IntoResponse {
    Json(HealthResponse {
        status: HealthStatus::Healthy,
        message: Some("Process is alive".to_string()),
        details: None,
    })
}

/// GET /health/ready - exposure store and summary cache probes
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Ready, possibly without caching", body = HealthResponse),
        (status = 503, description = "Exposure store unreachable", body = HealthResponse),
    ),
)]
pub async fn readiness(
    State(service): State<SharedSummaryService>,
    State(start_time): State<Instant>,
) -> impl IntoResponse {
    let exposure_store =
        ComponentHealth::probe(service.health_check(), HealthStatus::Unhealthy).await;

    let cache_enabled = service.cache_enabled();
    let summary_cache = if cache_enabled {
        Some(ComponentHealth::probe(service.cached_key_count(), HealthStatus::Degraded).await)
    } else {
        None
    };

    let status = overall_status(&exposure_store, summary_cache.as_ref());
    if status != HealthStatus::Healthy {
        tracing::warn!(?status, "Readiness probe failed");
    }

    let response = HealthResponse {
        status,
        message: None,
        details: Some(HealthDetails {
            exposure_store,
            summary_cache,
            cache_enabled,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: start_time.elapsed().as_secs(),
        }),
    };

    (status.http_status(), Json(response))
}

/// Create health check router
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
}
