//! Integration tests for metric recording and the scrape endpoint.
//!
//! Tests cover:
//! - Lost-update freedom under concurrent increments
//! - Idempotent scrape output
//! - Scrape counts consistent with handled requests
//! - Bounded series for unmatched paths

use api::middleware::UNMATCHED_ENDPOINT;
use axum::http::StatusCode;
use lookout_shared::models::{LabelSet, MetricSample};
use lookout_shared::registry::{CONTENT_TYPE, HTTP_REQUESTS_TOTAL};

use super::common::{get, get_text, test_app};

fn labels(method: &str, endpoint: &str, status: &str) -> LabelSet {
    LabelSet::from([
        ("method".to_string(), method.to_string()),
        ("endpoint".to_string(), endpoint.to_string()),
        ("status".to_string(), status.to_string()),
    ])
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_increments_are_not_lost() {
    let (_app, state) = test_app();

    let tasks: Vec<_> = (0..1000)
        .map(|_| {
            let state = state.clone();
            tokio::spawn(async move {
                state.emitter().emit_metric(
                    &MetricSample::counter(HTTP_REQUESTS_TOTAL)
                        .with_label("method", "POST")
                        .with_label("endpoint", "/api/portfolio")
                        .with_label("status", "201"),
                );
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(
        state
            .emitter()
            .registry()
            .counter_value(HTTP_REQUESTS_TOTAL, &labels("POST", "/api/portfolio", "201")),
        Some(1000)
    );
}

#[tokio::test]
async fn test_expose_metrics_is_idempotent() {
    let (_app, state) = test_app();
    state.emitter().emit_metric(
        &MetricSample::counter(HTTP_REQUESTS_TOTAL)
            .with_label("method", "GET")
            .with_label("endpoint", "/health")
            .with_label("status", "200"),
    );

    let first = state.emitter().expose_metrics().unwrap();
    let second = state.emitter().expose_metrics().unwrap();

    assert_eq!(first, second);
    assert_eq!(first.content_type, CONTENT_TYPE);
}

#[tokio::test]
async fn test_scrape_counts_match_handled_requests() {
    let (app, state) = test_app();

    for _ in 0..3 {
        let (status, _) = get(app.clone(), "/health").await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, _) = get(app.clone(), "/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, content_type, body) = get_text(app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("text/plain; version=0.0.4"));

    let health_line = r#"http_requests_total{endpoint="/health",method="GET",status="200"} 3"#;
    let missing_line = r#"http_requests_total{endpoint="unmatched",method="GET",status="404"} 1"#;
    assert!(body.lines().any(|line| line == health_line), "{body}");
    assert!(body.lines().any(|line| line == missing_line), "{body}");
    assert!(body
        .lines()
        .any(|line| line.starts_with("http_request_duration_seconds_count{endpoint=\"/health\"")));

    // The scrape request itself is counted after its body is rendered.
    assert_eq!(
        state
            .emitter()
            .registry()
            .counter_value(HTTP_REQUESTS_TOTAL, &labels("GET", "/metrics", "200")),
        Some(1)
    );
}

#[tokio::test]
async fn test_unmatched_paths_share_one_series() {
    let (app, state) = test_app();

    for i in 0..50 {
        let (status, _) = get(app.clone(), &format!("/scan/{i}")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    let registry = state.emitter().registry();
    assert_eq!(
        registry.counter_value(HTTP_REQUESTS_TOTAL, &labels("GET", UNMATCHED_ENDPOINT, "404")),
        Some(50)
    );
    assert_eq!(
        registry.counter_value(HTTP_REQUESTS_TOTAL, &labels("GET", "/scan/7", "404")),
        None
    );

    let body = state.emitter().expose_metrics().unwrap().body;
    let series = body
        .lines()
        .filter(|line| line.starts_with("http_requests_total{"))
        .count();
    assert_eq!(series, 1, "{body}");
}
