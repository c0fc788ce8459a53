//! Integration tests for log delivery.
//!
//! Tests cover:
//! - Unreachable and failing sinks never surface errors
//! - Single push attempt per batch
//! - Shutdown flush through the delivery worker
//! - Drop-oldest overflow
//! - Debug events gated by configuration
//! - Timestamp ordering in the pushed stream

use std::sync::Arc;
use std::time::{Duration, Instant};

use api::{app_metric_definitions, DeliveryStats, EmitterSettings, TelemetryEmitter};
use axum::http::StatusCode;
use lookout_shared::attributes;
use lookout_shared::config::{SinkEndpoint, LOKI_PUSH_PATH};
use lookout_shared::models::{Attributes, Event, Level};
use lookout_shared::push::PushContext;
use lookout_shared::registry::MetricsRegistry;

use super::common::MockSink;

fn emitter_for(endpoint: SinkEndpoint, queue_capacity: usize) -> TelemetryEmitter {
    emitter_with(endpoint, queue_capacity, false)
}

fn emitter_with(
    endpoint: SinkEndpoint,
    queue_capacity: usize,
    debug_enabled: bool,
) -> TelemetryEmitter {
    let registry = MetricsRegistry::with_http_defaults(app_metric_definitions()).unwrap();
    let settings = EmitterSettings {
        sink: Some(endpoint),
        context: PushContext::new("fastapi-app", "financial-planning", "test"),
        queue_capacity,
        debug_enabled,
        ..EmitterSettings::default()
    };
    TelemetryEmitter::new(settings, Arc::new(registry))
}

#[tokio::test]
async fn test_unreachable_sink_does_not_block_or_fail() {
    let timeout = Duration::from_millis(200);
    let endpoint = SinkEndpoint::new("http://10.255.255.1:3100", LOKI_PUSH_PATH, timeout).unwrap();
    let emitter = emitter_for(endpoint, 16);

    let started = Instant::now();
    emitter.emit_log(Level::Info, "GET /", attributes! { "method" => "GET" });
    assert!(started.elapsed() < Duration::from_millis(50));

    let started = Instant::now();
    emitter
        .send_now(Event::new(Level::Error, "Failed to create portfolio").unwrap())
        .await;
    assert!(started.elapsed() <= timeout + Duration::from_millis(500));

    emitter.shutdown().await;
    let stats = emitter.stats();
    assert_eq!(stats.pushed, 0);
    assert_eq!(stats.failed, 2);
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let sink = MockSink::start(StatusCode::INTERNAL_SERVER_ERROR).await;
    let emitter = emitter_for(sink.endpoint(Duration::from_secs(5)), 16);

    emitter
        .send_now(Event::new(Level::Info, "Health check accessed").unwrap())
        .await;

    assert_eq!(sink.hits(), 1);
    assert_eq!(emitter.stats().failed, 1);
}

#[tokio::test]
async fn test_queued_batch_is_not_retried_on_server_error() {
    let sink = MockSink::start(StatusCode::INTERNAL_SERVER_ERROR).await;
    let emitter = emitter_for(sink.endpoint(Duration::from_secs(5)), 16);

    for i in 0..3 {
        emitter.emit_log(Level::Info, format!("event {i}"), Attributes::new());
    }
    emitter.shutdown().await;

    assert_eq!(sink.hits(), 1);
    let stats = emitter.stats();
    assert_eq!(stats.enqueued, 3);
    assert_eq!(stats.failed, 3);
    assert_eq!(stats.pushed, 0);
}

#[tokio::test]
async fn test_debug_events_follow_debug_setting() {
    let sink = MockSink::start(StatusCode::NO_CONTENT).await;
    let quiet = emitter_with(sink.endpoint(Duration::from_secs(5)), 16, false);

    quiet.emit(Event::new(Level::Debug, "cache miss").unwrap());
    quiet.emit_log(Level::Debug, "cache miss", Attributes::new());
    quiet
        .send_now(Event::new(Level::Debug, "cache miss").unwrap())
        .await;
    quiet.shutdown().await;

    assert_eq!(quiet.stats(), DeliveryStats::default());
    assert_eq!(sink.hits(), 0);

    let verbose = emitter_with(sink.endpoint(Duration::from_secs(5)), 16, true);
    verbose.emit(Event::new(Level::Debug, "cache miss").unwrap());
    verbose.emit_log(Level::Debug, "cache hit", attributes! { "key" => "user:42" });
    verbose.shutdown().await;

    assert_eq!(verbose.stats().pushed, 2);
    assert_eq!(sink.messages(), vec!["cache miss", "cache hit"]);
    let streams: Vec<_> = sink
        .requests()
        .iter()
        .flat_map(|r| r.streams.clone())
        .collect();
    assert!(streams.iter().all(|s| s.stream["level"] == "debug"));
}

#[tokio::test]
async fn test_send_now_after_shutdown_is_dropped() {
    let sink = MockSink::start(StatusCode::NO_CONTENT).await;
    let emitter = emitter_for(sink.endpoint(Duration::from_secs(5)), 16);

    emitter.shutdown().await;
    emitter
        .send_now(Event::new(Level::Info, "too late").unwrap())
        .await;

    let stats = emitter.stats();
    assert_eq!(stats.dropped, 1);
    assert_eq!(stats.pushed, 0);
    assert_eq!(sink.hits(), 0);
}

#[tokio::test]
async fn test_shutdown_flushes_queued_events() {
    let sink = MockSink::start(StatusCode::NO_CONTENT).await;
    let emitter = emitter_for(sink.endpoint(Duration::from_secs(5)), 16);

    emitter.emit_log(
        Level::Info,
        "Creating portfolio",
        attributes! { "user_id" => "u-1", "portfolio_type" => "retirement" },
    );
    emitter.emit_log(Level::Warn, "Route not found", attributes! { "path" => "/x" });
    emitter.emit_log(Level::Debug, "not shipped", Attributes::new());
    emitter.shutdown().await;

    let stats = emitter.stats();
    assert_eq!(stats.enqueued, 2);
    assert_eq!(stats.pushed, 2);

    let requests = sink.requests();
    let streams: Vec<_> = requests.iter().flat_map(|r| r.streams.iter()).collect();
    assert_eq!(streams.len(), 2);
    assert_eq!(streams[0].stream["app"], "fastapi-app");
    assert_eq!(streams[0].stream["service"], "financial-planning");
    assert_eq!(streams[0].stream["level"], "info");
    assert_eq!(streams[1].stream["level"], "warn");

    let lines = sink.lines();
    let (_, creating) = &lines[0];
    assert_eq!(creating["message"], "Creating portfolio");
    assert_eq!(creating["environment"], "test");
    assert_eq!(creating["user_id"], "u-1");
    assert!(creating["timestamp"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn test_overflow_drops_oldest_events() {
    let sink = MockSink::start(StatusCode::NO_CONTENT).await;
    let emitter = emitter_for(sink.endpoint(Duration::from_secs(5)), 2);

    // No await between emits, so the worker cannot drain in between.
    for i in 0..5 {
        emitter.emit_log(Level::Info, format!("event {i}"), Attributes::new());
    }
    emitter.shutdown().await;

    let stats = emitter.stats();
    assert_eq!(stats.enqueued, 5);
    assert_eq!(stats.dropped, 3);
    assert_eq!(stats.pushed, 2);
    assert_eq!(sink.messages(), vec!["event 3", "event 4"]);
}

#[tokio::test]
async fn test_emitted_after_shutdown_is_dropped() {
    let sink = MockSink::start(StatusCode::NO_CONTENT).await;
    let emitter = emitter_for(sink.endpoint(Duration::from_secs(5)), 16);

    emitter.shutdown().await;
    emitter.emit_log(Level::Info, "too late", Attributes::new());

    assert_eq!(emitter.stats().dropped, 1);
    assert_eq!(sink.hits(), 0);
}

#[tokio::test]
async fn test_timestamps_are_non_decreasing_in_call_order() {
    let sink = MockSink::start(StatusCode::NO_CONTENT).await;
    let emitter = emitter_for(sink.endpoint(Duration::from_secs(5)), 256);

    for i in 0..200 {
        emitter.emit_log(Level::Info, format!("event {i}"), Attributes::new());
    }
    emitter.shutdown().await;

    let lines = sink.lines();
    assert_eq!(lines.len(), 200);
    assert!(lines.windows(2).all(|pair| pair[0].0 <= pair[1].0));
    assert_eq!(lines[0].1["message"], "event 0");
    assert_eq!(lines[199].1["message"], "event 199");
    // 200 events at the default batch size of 100.
    assert_eq!(sink.hits(), 2);
}
