//! Integration tests for the observability middleware and demo routes.
//!
//! Tests cover:
//! - Request/response log events shipped to the sink
//! - Metric labels per handled request
//! - Portfolio route success and failure paths

use axum::http::StatusCode;
use lookout_shared::models::LabelSet;
use lookout_shared::registry::{
    HTTP_ACTIVE_CONNECTIONS, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS,
};
use serde_json::json;

use super::common::{get, post_json, test_app, test_app_with_sink, MockSink};

fn labels(method: &str, endpoint: &str, status: &str) -> LabelSet {
    LabelSet::from([
        ("method".to_string(), method.to_string()),
        ("endpoint".to_string(), endpoint.to_string()),
        ("status".to_string(), status.to_string()),
    ])
}

#[tokio::test]
async fn test_request_lifecycle_is_shipped_in_order() {
    let sink = MockSink::start(StatusCode::NO_CONTENT).await;
    let (app, state) = test_app_with_sink(&sink);

    let (status, _) = get(app, "/").await;
    assert_eq!(status, StatusCode::OK);
    state.emitter().shutdown().await;

    assert_eq!(
        sink.messages(),
        vec!["GET /", "Root endpoint accessed", "Response 200"]
    );

    let lines = sink.lines();
    let (_, request) = &lines[0];
    assert_eq!(request["method"], "GET");
    assert_eq!(request["path"], "/");
    assert!(request.get("client_ip").is_some());

    let (_, response) = &lines[2];
    assert_eq!(response["status_code"], 200);
    assert!(response["duration"].as_f64().unwrap() >= 0.0);
}

#[tokio::test]
async fn test_get_root_records_labeled_samples() {
    let (app, state) = test_app();

    get(app, "/").await;

    let registry = state.emitter().registry();
    let labels = labels("GET", "/", "200");
    assert_eq!(registry.counter_value(HTTP_REQUESTS_TOTAL, &labels), Some(1));

    let histogram = registry
        .histogram_snapshot(HTTP_REQUEST_DURATION_SECONDS, &labels)
        .unwrap();
    assert_eq!(histogram.count, 1);
    assert!(histogram.sum >= 0.0);
    assert_eq!(registry.gauge_value(HTTP_ACTIVE_CONNECTIONS), Some(0));
}

#[tokio::test]
async fn test_create_portfolio() {
    let (app, state) = test_app();

    let (status, response) = post_json(
        app,
        "/api/portfolio",
        json!({"user_id": "u-7", "portfolio_type": "growth"}),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(response["status"], "created");
    assert_eq!(
        state
            .emitter()
            .registry()
            .counter_value(HTTP_REQUESTS_TOTAL, &labels("POST", "/api/portfolio", "201")),
        Some(1)
    );
}

#[tokio::test]
async fn test_create_portfolio_success_is_logged() {
    let sink = MockSink::start(StatusCode::NO_CONTENT).await;
    let (app, state) = test_app_with_sink(&sink);

    let (status, response) = post_json(
        app,
        "/api/portfolio",
        json!({"user_id": 9001, "portfolio_type": "retirement"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    state.emitter().shutdown().await;

    let lines = sink.lines();
    let created = lines
        .iter()
        .map(|(_, line)| line)
        .find(|line| line["message"] == "Portfolio created successfully")
        .unwrap();
    assert_eq!(created["portfolio_id"], response["id"]);
    assert_eq!(created["user_id"], 9001);
}

#[tokio::test]
async fn test_create_portfolio_failure_is_logged_and_propagated() {
    let sink = MockSink::start(StatusCode::NO_CONTENT).await;
    let (app, state) = test_app_with_sink(&sink);

    let (status, response) = post_json(app, "/api/portfolio", json!({"portfolio_type": "growth"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "missing_field");
    state.emitter().shutdown().await;

    let lines = sink.lines();
    let failure = lines
        .iter()
        .map(|(_, line)| line)
        .find(|line| line["message"] == "Failed to create portfolio")
        .unwrap();
    assert_eq!(failure["level"], "error");
    assert_eq!(failure["error"], "user_id is required");
    assert_eq!(
        state
            .emitter()
            .registry()
            .counter_value(HTTP_REQUESTS_TOTAL, &labels("POST", "/api/portfolio", "400")),
        Some(1)
    );
}

#[tokio::test]
async fn test_not_found_emits_warning() {
    let sink = MockSink::start(StatusCode::NO_CONTENT).await;
    let (app, state) = test_app_with_sink(&sink);

    let (status, _) = get(app, "/nowhere").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    state.emitter().shutdown().await;

    let requests = sink.requests();
    let warn_stream = requests
        .iter()
        .flat_map(|r| r.streams.iter())
        .find(|s| s.stream["level"] == "warn")
        .unwrap();
    assert_eq!(warn_stream.values.len(), 1);
    assert!(warn_stream.values[0].1.contains("Route not found"));
}
