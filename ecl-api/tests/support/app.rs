//! Router harness shared by the HTTP tests.

use axum::{
    body::Body,
    http::{header, Method, Request, Response, StatusCode},
    Router,
};
use ecl_api::{create_api_router, shared_service, ApiConfig, SharedSummaryService};
use ecl_core::{EclConfig, ExposureRecord};
use ecl_test_utils::fixtures;
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use tower::ServiceExt;

/// Service preloaded with `records`, with or without caching.
pub fn test_service(records: Vec<ExposureRecord>, cache_enabled: bool) -> SharedSummaryService {
    let config = EclConfig::default().with_cache_enabled(cache_enabled);
    shared_service(fixtures::in_memory_service_with(records, &config))
}

pub fn test_router(service: SharedSummaryService) -> Router {
    create_api_router(service, &ApiConfig::default())
}

pub fn test_router_without_metrics(service: SharedSummaryService) -> Router {
    let config = ApiConfig {
        metrics_enabled: false,
        ..ApiConfig::default()
    };
    create_api_router(service, &config)
}

pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router
        .clone()
        .oneshot(request)
        .await
        .expect("router is infallible")
}

pub fn json_request(method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("valid request")
}

pub fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("valid request")
}

pub async fn read_json<T: DeserializeOwned>(response: Response<Body>) -> T {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body is valid JSON")
}

pub fn cache_header(response: &Response<Body>) -> Option<&str> {
    response
        .headers()
        .get("x-cache")
        .and_then(|v| v.to_str().ok())
}

#[track_caller]
pub fn assert_status(response: &Response<Body>, expected: StatusCode) {
    assert_eq!(response.status(), expected, "unexpected status");
}
