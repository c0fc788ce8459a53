//! Integration tests for health check and general API functionality.
//!
//! Tests cover:
//! - Health check endpoint
//! - Root index
//! - Not-found fallback

use axum::http::StatusCode;

use super::common::{get, test_app};

#[tokio::test]
async fn test_health_check() {
    let (app, _state) = test_app();

    let (status, response) = get(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["status"], "healthy");
    assert_eq!(response["service"], "lookout-api");
    assert_eq!(response["environment"], "test");
    assert!(response["uptime_secs"].is_u64());
}

#[tokio::test]
async fn test_root_index() {
    let (app, _state) = test_app();

    let (status, response) = get(app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["endpoints"]["health"], "/health");
    assert_eq!(response["endpoints"]["portfolio"], "/api/portfolio");
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let (app, _state) = test_app();

    let (status, response) = get(app, "/api/unknown").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(response["error"], "Not found");
    assert_eq!(response["message"], "Route GET /api/unknown not found");
}
