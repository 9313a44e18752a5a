//! Integration tests for health check endpoints

mod common;

use axum::http::StatusCode;
use common::{get, TestApp};

#[tokio::test]
async fn test_simple_health_check() {
    let app = TestApp::new();
    let (status, body) = get(&app.router, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
}

#[tokio::test]
async fn test_liveness_check() {
    let app = TestApp::new();
    let (status, body) = get(&app.router, "/health/live", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "alive");
    assert!(body.get("version").is_some());
}

#[tokio::test]
async fn test_readiness_reports_counters() {
    let app = TestApp::new();
    app.state.pairing.register().unwrap();

    let (status, body) = get(&app.router, "/health/ready", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["stations"], 2);
    assert_eq!(body["displays"], 0);
    assert_eq!(body["pairing_sessions"], 1);
}

#[tokio::test]
async fn test_unknown_route_404() {
    let app = TestApp::new();
    let (status, _) = get(&app.router, "/nonexistent", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
