//! Health Check API Tests

use axum::http::StatusCode;

use crate::common::{json_body, TestApp};

/// Test basic health check endpoint returns 200 OK
#[tokio::test]
async fn test_health_check_returns_ok() {
    let app = TestApp::new();

    let response = app.get("/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "healthy");
    assert!(json.get("version").is_some());
}

/// Test liveness probe endpoint
#[tokio::test]
async fn test_liveness_probe() {
    let app = TestApp::new();

    let response = app.get("/health/live").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "alive");
}

/// Every response carries a request id
#[tokio::test]
async fn test_request_id_is_propagated() {
    let app = TestApp::new();

    let response = app.get("/health").await;

    assert!(response.headers().contains_key("x-request-id"));
}

/// Test metrics endpoint serves the Prometheus text format
#[tokio::test]
async fn test_metrics_endpoint() {
    let app = TestApp::new();
    app.get("/health").await;

    let response = app.get("/metrics").await;

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));
}
