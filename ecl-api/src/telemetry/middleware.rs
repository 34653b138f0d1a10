//! Axum Middleware for HTTP Request Tracing and Metrics
//!
//! Wraps every request in a tracing span, records Prometheus metrics and
//! logs completion.

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{info_span, Instrument};

use super::metrics::MetricsRecorder;

/// Label used for requests that did not match any route.
const UNMATCHED_ROUTE: &str = "unmatched";

/// Route template for metrics and spans.
///
/// Uses the matched route pattern rather than the raw path so unknown paths
/// cannot blow up Prometheus label cardinality.
fn route_label(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string())
}

/// Observability middleware for Axum.
///
/// This middleware wraps every request with:
/// 1. A `http_request` tracing span
/// 2. Prometheus metrics recording, when enabled
/// 3. Request/response logging
pub async fn observability_middleware(
    State(metrics): State<MetricsRecorder>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let route = route_label(&request);

    let span = info_span!(
        "http_request",
        http.method = %method,
        http.target = %path,
        http.route = %route,
    );

    let response = next.run(request).instrument(span).await;

    let duration = start.elapsed();
    let status = response.status();

    if let Some(metrics) = metrics.get() {
        metrics.record_http_request(
            method.as_str(),
            &route,
            status.as_u16(),
            duration.as_secs_f64(),
        );
    }

    if status.is_server_error() {
        tracing::warn!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms = duration.as_millis() as u64,
            "Request failed"
        );
    } else {
        tracing::info!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms = duration.as_millis() as u64,
            "Request completed"
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::middleware::from_fn_with_state;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    #[test]
    fn test_route_label_without_match() {
        let request = Request::builder()
            .uri("/nowhere/123")
            .body(Body::empty())
            .unwrap();
        assert_eq!(route_label(&request), UNMATCHED_ROUTE);
    }

    #[tokio::test]
    async fn test_middleware_passes_response_through() {
        let app = Router::new()
            .route("/health/ping", get(|| async { "pong" }))
            .layer(from_fn_with_state(
                MetricsRecorder::disabled(),
                observability_middleware,
            ));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health/ping")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
