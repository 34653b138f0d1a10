//! Prometheus Metrics Definitions
//!
//! Defines all ECL API metrics with appropriate labels and types.
//! Exposes a /metrics endpoint for Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Summary computation buckets (seconds). Cache hits land in the first two.
const SUMMARY_LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0,
];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ApiResult<EclMetrics>> = Lazy::new(EclMetrics::new);

/// Handle the router passes to code that records metrics.
///
/// Disabled, or when registration failed, every recording is skipped.
#[derive(Clone, Copy, Default)]
pub struct MetricsRecorder(Option<&'static EclMetrics>);

impl MetricsRecorder {
    pub fn new(enabled: bool) -> Self {
        if !enabled {
            return Self::disabled();
        }
        match METRICS.as_ref() {
            Ok(metrics) => Self(Some(metrics)),
            Err(e) => {
                tracing::error!(error = %e.message, "Metrics registration failed, recording disabled");
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self(None)
    }

    pub fn get(&self) -> Option<&'static EclMetrics> {
        self.0
    }

    pub fn is_enabled(&self) -> bool {
        self.0.is_some()
    }
}

/// Outcome label of a summary request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryOutcome {
    Hit,
    Miss,
    Error,
}

impl SummaryOutcome {
    pub fn as_label(&self) -> &'static str {
        match self {
            SummaryOutcome::Hit => "hit",
            SummaryOutcome::Miss => "miss",
            SummaryOutcome::Error => "error",
        }
    }
}

/// Container for all ECL API metrics.
#[derive(Clone)]
pub struct EclMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Threshold summary requests - labels: outcome (hit/miss/error)
    pub summary_requests_total: CounterVec,

    /// Time to produce a summary - labels: outcome
    pub summary_duration_seconds: HistogramVec,

    /// Invalidation calls - labels: scope (all/snapshot)
    pub cache_invalidations_total: CounterVec,

    /// Cache entries removed by invalidation - labels: scope
    pub cache_evicted_entries_total: CounterVec,

    /// Summary keys currently stored in the cache
    pub cache_registered_keys: Gauge,
}

impl EclMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "ecl_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_requests_total: {}", e)))?,

            http_request_duration_seconds: register_histogram_vec!(
                "ecl_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_request_duration_seconds: {}", e)))?,

            summary_requests_total: register_counter_vec!(
                "ecl_threshold_summary_requests_total",
                "Threshold summary requests by cache outcome",
                &["outcome"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register summary_requests_total: {}", e)))?,

            summary_duration_seconds: register_histogram_vec!(
                "ecl_threshold_summary_duration_seconds",
                "Time to produce a threshold summary in seconds",
                &["outcome"],
                SUMMARY_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register summary_duration_seconds: {}", e)))?,

            cache_invalidations_total: register_counter_vec!(
                "ecl_summary_cache_invalidations_total",
                "Summary cache invalidation calls",
                &["scope"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register cache_invalidations_total: {}", e)))?,

            cache_evicted_entries_total: register_counter_vec!(
                "ecl_summary_cache_evicted_entries_total",
                "Summary cache entries removed by invalidation",
                &["scope"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register cache_evicted_entries_total: {}", e)))?,

            cache_registered_keys: register_gauge!(
                "ecl_summary_cache_registered_keys",
                "Summary keys currently stored in the cache"
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register cache_registered_keys: {}", e)))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record a threshold summary request.
    pub fn record_summary(&self, outcome: SummaryOutcome, duration_secs: f64) {
        let label = outcome.as_label();
        self.summary_requests_total.with_label_values(&[label]).inc();
        self.summary_duration_seconds
            .with_label_values(&[label])
            .observe(duration_secs);
    }

    /// Record an invalidation pass and how many entries it removed.
    pub fn record_invalidation(&self, scope: &str, evicted: usize) {
        self.cache_invalidations_total
            .with_label_values(&[scope])
            .inc();
        self.cache_evicted_entries_total
            .with_label_values(&[scope])
            .inc_by(evicted as f64);
    }

    /// Set the stored key count.
    pub fn set_registered_keys(&self, count: usize) {
        self.cache_registered_keys.set(count as f64);
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
)]
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}
