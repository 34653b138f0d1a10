//! OpenAPI Specification for the ECL API
//!
//! Generated with utoipa from the route annotations and the request,
//! response and domain types.

use utoipa::OpenApi;

use crate::error::{ApiError, ErrorCode};
use crate::routes::{health, impairment};
use crate::telemetry::metrics;
use crate::types::{
    CreateExposuresRequest, ExposureChangeResponse, ExposureInput, InvalidationResponse,
    ThresholdSummaryRequest,
};
use ecl_core::{ImpairmentBucket, ThresholdSummary};

/// OpenAPI document for the ECL API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "ECL Threshold Summary API",
        version = "0.1.0",
        description = "Expected credit loss threshold summaries over customer exposures, with cached aggregation",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local Development")
    ),
    tags(
        (name = "Impairment", description = "Threshold summaries and the exposure changes that invalidate them"),
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        impairment::threshold_summary,
        impairment::create_exposures,
        impairment::delete_exposures,
        impairment::clear_cache,
        health::ping,
        health::liveness,
        health::readiness,
        metrics::metrics_handler,
    ),
    components(schemas(
        ThresholdSummaryRequest,
        ThresholdSummary,
        ImpairmentBucket,
        ExposureInput,
        CreateExposuresRequest,
        ExposureChangeResponse,
        InvalidationResponse,
        health::HealthResponse,
        health::HealthStatus,
        health::HealthDetails,
        health::ComponentHealth,
        ApiError,
        ErrorCode,
    ))
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Generate OpenAPI spec as JSON string.
    pub fn to_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}
