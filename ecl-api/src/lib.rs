//! ECL API - REST Layer for Impairment Threshold Summaries
//!
//! Exposes the threshold summary aggregation over HTTP (Axum), together with
//! the exposure writes that invalidate cached summaries, health checks,
//! Prometheus metrics and the OpenAPI document.
//!
//! The exposure store is either in-memory or PostgreSQL; the summary cache is
//! either in-memory or LMDB. Both are picked at startup from [`ApiConfig`].

pub mod macros;

pub mod config;
pub mod db;
pub mod error;
pub mod openapi;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;
pub mod types;

// Re-export commonly used types
pub use config::{ApiConfig, CacheBackendKind, ExposureStoreKind};
pub use db::{DbConfig, PgExposureStore};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use services::{
    build_summary_service, seed_sample_portfolio, shared_service, with_configured_cache,
    SeedOptions, SharedSummaryService, SummaryApi,
};
pub use state::AppState;
pub use telemetry::{init_tracer, LogFormat, TelemetryConfig};
pub use types::*;
