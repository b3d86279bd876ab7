// ABOUTME: End-to-end tests for the insight HTTP endpoints against a stub backend
// ABOUTME: Covers the success path, provenance header, validation, caching, and errors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Insight Agent

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{
    coach_payload_json, fraud_payload_json, spending_payload_json, test_config, test_resources,
    StubBackend, StubOutcome,
};
use std::sync::Arc;
use tower::ServiceExt;

const SAMPLE_BODY: &str =
    r#"{"transactions":[{"date":"2025-09-22","label":"Inbound","amount":250000}]}"#;

fn router_with(backend: Arc<StubBackend>) -> Router {
    let resources = test_resources(test_config(), backend);
    insight_agent::server::HttpServer::new(resources).router()
}

fn post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_owned()))
        .expect("request builds")
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("body is JSON")
}

#[tokio::test]
async fn test_spending_analysis_success_with_provenance_header() {
    let backend = Arc::new(StubBackend::new(StubOutcome::Text(spending_payload_json())));
    let router = router_with(backend.clone());

    let response = router
        .oneshot(post("/api/spending/analyze", SAMPLE_BODY))
        .await
        .expect("infallible");

    assert_eq!(response.status(), StatusCode::OK);

    let provenance = response
        .headers()
        .get("x-insight-prompt")
        .expect("provenance header present")
        .to_str()
        .expect("ascii header")
        .to_owned();

    // <promptName>@<8 hex chars>
    let (name, hash) = provenance.split_once('@').expect("name@hash form");
    assert!(!name.is_empty());
    assert!(name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_'));
    assert_eq!(hash.len(), 8);
    assert!(hash
        .chars()
        .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

    let body = body_json(response).await;
    assert!(body["summary"].is_string());
    assert!(body["top_categories"].is_array());
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test]
async fn test_budget_coach_buckets_normalized_to_hundred() {
    // Stubbed buckets sum to 60; the service must rescale to ~100.
    let backend = Arc::new(StubBackend::new(StubOutcome::Text(coach_payload_json())));
    let router = router_with(backend);

    let response = router
        .oneshot(post("/api/budget/coach", SAMPLE_BODY))
        .await
        .expect("infallible");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let buckets = body["budget_buckets"].as_array().expect("buckets array");
    let sum: f64 = buckets
        .iter()
        .map(|b| b["percent"].as_f64().expect("numeric percent"))
        .sum();
    assert!((sum - 100.0).abs() <= 2.0, "bucket sum {sum} outside tolerance");
}

#[tokio::test]
async fn test_fraud_detect_success() {
    let backend = Arc::new(StubBackend::new(StubOutcome::Text(fraud_payload_json())));
    let router = router_with(backend);

    let response = router
        .oneshot(post("/api/fraud/detect", SAMPLE_BODY))
        .await
        .expect("infallible");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["overall_risk"], "low");
    assert!(body["findings"].is_array());
}

#[tokio::test]
async fn test_string_amount_rejected_before_model_call() {
    let backend = Arc::new(StubBackend::new(StubOutcome::Text(spending_payload_json())));
    let router = router_with(backend.clone());

    let body = r#"{"transactions":[{"date":"2025-09-22","label":"Inbound","amount":"fifty"}]}"#;
    let response = router
        .oneshot(post("/api/spending/analyze", body))
        .await
        .expect("infallible");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get("x-insight-prompt").is_none());

    let error_body = body_json(response).await;
    assert!(error_body["error"]["message"].is_string());

    // Validation failures never reach the backend.
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn test_empty_transaction_list_is_accepted() {
    let backend = Arc::new(StubBackend::new(StubOutcome::Text(spending_payload_json())));
    let router = router_with(backend.clone());

    let response = router
        .oneshot(post("/api/spending/analyze", r#"{"transactions":[]}"#))
        .await
        .expect("infallible");

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["summary"].is_string());
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test]
async fn test_repeated_identical_request_served_from_cache() {
    let backend = Arc::new(StubBackend::new(StubOutcome::Text(spending_payload_json())));
    let resources = test_resources(test_config(), backend.clone());
    let router = insight_agent::server::HttpServer::new(resources).router();

    let first = router
        .clone()
        .oneshot(post("/api/spending/analyze", SAMPLE_BODY))
        .await
        .expect("infallible");
    assert_eq!(first.status(), StatusCode::OK);

    let second = router
        .clone()
        .oneshot(post("/api/spending/analyze", SAMPLE_BODY))
        .await
        .expect("infallible");
    assert_eq!(second.status(), StatusCode::OK);

    // Cache hits still carry provenance but skip the model call.
    assert!(second.headers().get("x-insight-prompt").is_some());
    assert_eq!(backend.call_count(), 1);

    // A different payload misses the cache.
    let other_body =
        r#"{"transactions":[{"date":"2025-09-23","label":"Outbound","amount":-125.5}]}"#;
    let third = router
        .oneshot(post("/api/spending/analyze", other_body))
        .await
        .expect("infallible");
    assert_eq!(third.status(), StatusCode::OK);
    assert_eq!(backend.call_count(), 2);
}

#[tokio::test]
async fn test_retry_exhaustion_maps_to_bad_gateway_json() {
    let backend = Arc::new(StubBackend::new(StubOutcome::Transient(None)));
    let router = router_with(backend.clone());

    let response = router
        .oneshot(post("/api/spending/analyze", SAMPLE_BODY))
        .await
        .expect("infallible");

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(response.headers().get("x-insight-prompt").is_none());

    let error_body = body_json(response).await;
    assert_eq!(error_body["error"]["code"], "UPSTREAM_TRANSIENT");
    assert!(error_body["error"]["message"].is_string());

    // The configured retry ceiling was honored.
    assert_eq!(backend.call_count(), test_config().retry.max_attempts);
}

#[tokio::test]
async fn test_health_endpoints() {
    let backend = Arc::new(StubBackend::new(StubOutcome::Text(spending_payload_json())));
    let router = router_with(backend);

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("infallible");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
}
