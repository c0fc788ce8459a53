//! Common test utilities and helpers for integration tests.
//!
//! This module provides shared functionality used across all integration tests,
//! including test app setup, HTTP request helpers and a recording log sink.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use api::{create_router, AppState, Config};
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use http_body_util::BodyExt;
use lookout_shared::config::{SinkEndpoint, LOKI_PUSH_PATH};
use lookout_shared::push::PushRequest;
use serde_json::Value;
use tokio::net::TcpListener;

/// Creates a test router whose emitter discards log events.
///
/// # Returns
///
/// A tuple containing the configured router and the app state.
pub fn test_app() -> (Router, AppState) {
    let state = AppState::without_sink();
    let router = create_router(state.clone());
    (router, state)
}

/// Creates a test router shipping logs to the given sink.
///
/// Must be called inside a Tokio runtime so the delivery worker starts.
pub fn test_app_with_sink(sink: &MockSink) -> (Router, AppState) {
    let config = Config {
        sink: Some(sink.endpoint(Duration::from_secs(5))),
        environment: "test".to_string(),
        ..Config::default()
    };
    let state = AppState::from_config(&config).unwrap();
    let router = create_router(state.clone());
    (router, state)
}

/// A log sink bound on a random local port that records every push.
#[derive(Clone)]
pub struct MockSink {
    /// Base URL, e.g. `http://127.0.0.1:41234`.
    pub base_url: String,
    received: Arc<Mutex<Vec<PushRequest>>>,
}

impl MockSink {
    /// Starts a sink answering every push with `status`.
    pub async fn start(status: StatusCode) -> Self {
        let received = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route(
                LOKI_PUSH_PATH,
                post(
                    move |State(received): State<Arc<Mutex<Vec<PushRequest>>>>,
                          Json(body): Json<PushRequest>| async move {
                        received.lock().unwrap().push(body);
                        status
                    },
                ),
            )
            .with_state(received.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            received,
        }
    }

    /// Endpoint pointing at this sink.
    pub fn endpoint(&self, timeout: Duration) -> SinkEndpoint {
        SinkEndpoint::new(&self.base_url, LOKI_PUSH_PATH, timeout).unwrap()
    }

    /// Number of push requests received.
    pub fn hits(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    /// All received push requests, in arrival order.
    pub fn requests(&self) -> Vec<PushRequest> {
        self.received.lock().unwrap().clone()
    }

    /// Every pushed line, decoded, with its epoch-nanosecond timestamp.
    pub fn lines(&self) -> Vec<(i64, Value)> {
        self.requests()
            .iter()
            .flat_map(|request| request.streams.iter())
            .flat_map(|stream| stream.values.iter())
            .map(|(ts, line)| (ts.parse().unwrap(), serde_json::from_str(line).unwrap()))
            .collect()
    }

    /// Messages of every pushed line, in arrival order.
    pub fn messages(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .map(|(_, line)| line["message"].as_str().unwrap().to_string())
            .collect()
    }
}

/// Helper to make a POST request with JSON body.
///
/// # Arguments
///
/// * `app` - The Axum router to send the request to
/// * `uri` - The URI path to POST to
/// * `body` - The JSON body to send
///
/// # Returns
///
/// A tuple containing the response status code and parsed JSON response body.
pub async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = tower::ServiceExt::oneshot(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
    )
    .await
    .unwrap();

    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

    (status, json)
}

/// Helper to make a GET request.
///
/// # Returns
///
/// A tuple containing the response status code and parsed JSON response body.
pub async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let (status, _, body) = get_text(app, uri).await;
    let json: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
    (status, json)
}

/// Helper to make a GET request returning the raw body.
///
/// # Returns
///
/// The status code, the `content-type` header, and the body text.
pub async fn get_text(app: Router, uri: &str) -> (StatusCode, Option<String>, String) {
    let response = tower::ServiceExt::oneshot(
        app,
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();

    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();

    (
        status,
        content_type,
        String::from_utf8(body_bytes.to_vec()).unwrap(),
    )
}
