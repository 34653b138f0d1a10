//! Shared application state for Axum routers.

use std::time::Instant;

use crate::services::SharedSummaryService;
use crate::telemetry::MetricsRecorder;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Threshold summary service with its exposure store and cache.
    pub summaries: SharedSummaryService,
    pub metrics: MetricsRecorder,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(summaries: SharedSummaryService, metrics: MetricsRecorder) -> Self {
        Self {
            summaries,
            metrics,
            start_time: Instant::now(),
        }
    }
}

crate::impl_from_ref!(SharedSummaryService, summaries);
crate::impl_from_ref!(MetricsRecorder, metrics);
crate::impl_from_ref!(Instant, start_time);
