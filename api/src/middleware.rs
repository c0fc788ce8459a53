//! Per-request observability hook.
//!
//! Runs once before and once after every handled request: logs the request
//! and the response through the emitter, updates the request counter and
//! duration histogram, and tracks in-flight requests on a gauge.

use axum::{
    extract::{ConnectInfo, MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use lookout_shared::attributes;
use lookout_shared::models::{Level, MetricSample};
use lookout_shared::registry::{
    HTTP_ACTIVE_CONNECTIONS, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS,
};

use crate::emitter::{duration_attribute, TelemetryEmitter};
use crate::state::AppState;

/// `endpoint` label for requests no route matched. Raw paths stay out of
/// the label set so unknown URLs cannot create new series.
pub const UNMATCHED_ENDPOINT: &str = "unmatched";

/// What the host framework tells the hook about a finished request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOutcome {
    /// HTTP method, e.g. `GET`.
    pub method: String,
    /// Matched route template, or [`UNMATCHED_ENDPOINT`].
    pub endpoint: String,
    /// Response status code.
    pub status: u16,
    /// Time spent in the handler chain.
    pub elapsed: Duration,
}

impl RequestOutcome {
    /// Converts the outcome into the counter increment and the duration
    /// observation, both labeled `{method, endpoint, status}`.
    #[must_use]
    pub fn samples(&self) -> [MetricSample; 2] {
        let status = self.status.to_string();
        [
            MetricSample::counter(HTTP_REQUESTS_TOTAL)
                .with_label("method", self.method.as_str())
                .with_label("endpoint", self.endpoint.as_str())
                .with_label("status", status.as_str()),
            MetricSample::histogram(HTTP_REQUEST_DURATION_SECONDS, self.elapsed.as_secs_f64())
                .with_label("method", self.method.as_str())
                .with_label("endpoint", self.endpoint.as_str())
                .with_label("status", status),
        ]
    }
}

/// Decrements the in-flight gauge when dropped, including on cancellation.
struct InFlight<'a> {
    emitter: &'a TelemetryEmitter,
}

impl<'a> InFlight<'a> {
    fn enter(emitter: &'a TelemetryEmitter) -> Self {
        emitter.emit_metric(&MetricSample::gauge(HTTP_ACTIVE_CONNECTIONS, 1));
        Self { emitter }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.emitter
            .emit_metric(&MetricSample::gauge(HTTP_ACTIVE_CONNECTIONS, -1));
    }
}

/// Axum middleware wiring the emitter into the request lifecycle.
pub async fn observability_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let emitter = state.emitter();

    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map_or(UNMATCHED_ENDPOINT, MatchedPath::as_str)
        .to_string();
    let client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());

    let _in_flight = InFlight::enter(emitter);

    emitter.emit_log(
        Level::Info,
        format!("{method} {path}"),
        attributes! {
            "method" => &method,
            "path" => &path,
            "client_ip" => client_ip,
        },
    );

    let response = next.run(request).await;

    let outcome = RequestOutcome {
        method,
        endpoint,
        status: response.status().as_u16(),
        elapsed: started.elapsed(),
    };
    for sample in &outcome.samples() {
        emitter.emit_metric(sample);
    }

    emitter.emit_log(
        Level::Info,
        format!("Response {}", outcome.status),
        attributes! {
            "method" => outcome.method,
            "path" => path,
            "status_code" => outcome.status,
            "duration" => duration_attribute(outcome.elapsed),
        },
    );

    response
}
