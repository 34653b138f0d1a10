//! Impairment REST API Routes
//!
//! Threshold summary reads plus the exposure writes and cache maintenance
//! that invalidate them:
//! - `POST   /api/impairment/ecl/threshold-summary`
//! - `POST   /api/impairment/ecl/exposures`
//! - `DELETE /api/impairment/ecl/exposures?branchId&asOfDate&currency`
//! - `DELETE /api/impairment/ecl/cache`

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{delete, post},
    Json, Router,
};
use ecl_core::{ExposureRecord, ThresholdSummary};
use std::time::Instant;

use crate::error::{ApiError, ApiResult};
use crate::services::SharedSummaryService;
use crate::state::AppState;
use crate::telemetry::metrics::{MetricsRecorder, SummaryOutcome};
use crate::types::{
    CreateExposuresRequest, DeleteSnapshotParams, ExposureChangeResponse, InvalidationResponse,
    ThresholdSummaryRequest,
};

/// Response header telling whether the summary came from the cache.
pub const CACHE_STATUS_HEADER: HeaderName = HeaderName::from_static("x-cache");

fn cache_status(read_from_cache: bool, cache_enabled: bool) -> HeaderValue {
    match (cache_enabled, read_from_cache) {
        (false, _) => HeaderValue::from_static("BYPASS"),
        (true, true) => HeaderValue::from_static("HIT"),
        (true, false) => HeaderValue::from_static("MISS"),
    }
}

/// Refresh the stored-key gauge. Failures only cost an out-of-date gauge.
async fn refresh_key_gauge(service: &SharedSummaryService, metrics: MetricsRecorder) {
    let Some(metrics) = metrics.get() else {
        return;
    };
    match service.cached_key_count().await {
        Ok(count) => metrics.set_registered_keys(count),
        Err(e) => tracing::warn!(error = %e, "Failed to count cached summary keys"),
    }
}

fn record_invalidation(
    metrics: MetricsRecorder,
    scope: &str,
    invalidation: &InvalidationResponse,
) {
    if let Some(metrics) = metrics.get() {
        metrics.record_invalidation(scope, invalidation.evicted);
    }
    if invalidation.retained > 0 {
        tracing::warn!(
            scope,
            retained = invalidation.retained,
            "Some cached summaries could not be evicted"
        );
    }
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// Compute the impairment threshold summary.
///
/// Customers are grouped by id and their amortized cost summed; each total at
/// or above the threshold counts as individually impaired, the rest as
/// collectively impaired. Results are cached per (date, branch, currency,
/// threshold) until the TTL elapses or a matching exposure change evicts them.
#[utoipa::path(
    post,
    path = "/api/impairment/ecl/threshold-summary",
    tag = "Impairment",
    request_body = ThresholdSummaryRequest,
    responses(
        (status = 200, description = "Threshold summary", body = ThresholdSummary,
            headers(("x-cache" = String, description = "HIT, MISS or BYPASS"))),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 500, description = "Exposure store failure", body = ApiError),
    ),
)]
pub async fn threshold_summary(
    State(service): State<SharedSummaryService>,
    State(metrics): State<MetricsRecorder>,
    payload: Result<Json<ThresholdSummaryRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    let query = request.into_query()?;

    let start = Instant::now();
    let result = service.summarize(&query).await;
    let elapsed = start.elapsed().as_secs_f64();

    let read = match result {
        Ok(read) => read,
        Err(e) => {
            if let Some(metrics) = metrics.get() {
                metrics.record_summary(SummaryOutcome::Error, elapsed);
            }
            return Err(e.into());
        }
    };

    let outcome = if read.was_cache_hit() {
        SummaryOutcome::Hit
    } else {
        SummaryOutcome::Miss
    };
    if let Some(recorder) = metrics.get() {
        recorder.record_summary(outcome, elapsed);
    }
    if read.was_cache_miss() && service.cache_enabled() {
        refresh_key_gauge(&service, metrics).await;
    }

    let header = cache_status(read.was_cache_hit(), service.cache_enabled());
    let summary: ThresholdSummary = read.into_summary();
    Ok(([(CACHE_STATUS_HEADER, header)], Json(summary)))
}

/// Insert exposure rows and evict every cached summary they affect.
#[utoipa::path(
    post,
    path = "/api/impairment/ecl/exposures",
    tag = "Impairment",
    request_body = CreateExposuresRequest,
    responses(
        (status = 201, description = "Rows inserted", body = ExposureChangeResponse),
        (status = 400, description = "Invalid row", body = ApiError),
        (status = 500, description = "Exposure store failure", body = ApiError),
    ),
)]
pub async fn create_exposures(
    State(service): State<SharedSummaryService>,
    State(metrics): State<MetricsRecorder>,
    payload: Result<Json<CreateExposuresRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    if request.exposures.is_empty() {
        return Err(ApiError::validation_failed(
            "At least one exposure row is required",
        ));
    }

    let records = request
        .exposures
        .into_iter()
        .enumerate()
        .map(|(index, input)| {
            input.into_record().map_err(|e| {
                let err = ApiError::from(e);
                let mut details = err.details.clone().unwrap_or_else(|| serde_json::json!({}));
                details["index"] = serde_json::json!(index);
                err.with_details(details)
            })
        })
        .collect::<ApiResult<Vec<ExposureRecord>>>()?;

    let change = service.record_exposures(&records).await?;
    let response = ExposureChangeResponse::from(change);
    record_invalidation(metrics, "snapshot", &response.invalidation);
    refresh_key_gauge(&service, metrics).await;

    tracing::info!(
        rows = response.rows,
        evicted = response.invalidation.evicted,
        "Recorded exposure rows"
    );
    Ok((StatusCode::CREATED, Json(response)))
}

/// Delete one exposure snapshot and evict the summaries that covered it.
#[utoipa::path(
    delete,
    path = "/api/impairment/ecl/exposures",
    tag = "Impairment",
    params(DeleteSnapshotParams),
    responses(
        (status = 200, description = "Snapshot deleted", body = ExposureChangeResponse),
        (status = 400, description = "Invalid parameters", body = ApiError),
        (status = 500, description = "Exposure store failure", body = ApiError),
    ),
)]
pub async fn delete_exposures(
    State(service): State<SharedSummaryService>,
    State(metrics): State<MetricsRecorder>,
    params: Result<Query<DeleteSnapshotParams>, QueryRejection>,
) -> ApiResult<Json<ExposureChangeResponse>> {
    let Query(params) = params?;
    let scope = params.into_scope()?;

    let change = service.remove_snapshot(&scope).await?;
    let response = ExposureChangeResponse::from(change);
    record_invalidation(metrics, "snapshot", &response.invalidation);
    refresh_key_gauge(&service, metrics).await;

    tracing::info!(
        branch_id = %scope.branch_id,
        as_of_date = %scope.as_of_date,
        currency = ?scope.currency.as_ref().map(|c| c.as_str()),
        rows = response.rows,
        evicted = response.invalidation.evicted,
        "Deleted exposure snapshot"
    );
    Ok(Json(response))
}

/// Evict every cached threshold summary.
#[utoipa::path(
    delete,
    path = "/api/impairment/ecl/cache",
    tag = "Impairment",
    responses(
        (status = 200, description = "Cache cleared", body = InvalidationResponse),
        (status = 500, description = "Cache failure", body = ApiError),
    ),
)]
pub async fn clear_cache(
    State(service): State<SharedSummaryService>,
    State(metrics): State<MetricsRecorder>,
) -> ApiResult<Json<InvalidationResponse>> {
    let response = InvalidationResponse::from(service.invalidate_all().await?);
    record_invalidation(metrics, "all", &response);
    refresh_key_gauge(&service, metrics).await;

    Ok(Json(response))
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the impairment router, mounted at `/api/impairment/ecl`.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/threshold-summary", post(threshold_summary))
        .route("/exposures", post(create_exposures).delete(delete_exposures))
        .route("/cache", delete(clear_cache))
}
