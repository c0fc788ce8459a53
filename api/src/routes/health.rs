//! Health check endpoint.
//!
//! Provides a simple health check endpoint for load balancers and monitoring systems.

use axum::{extract::State, routing::get, Json, Router};
use lookout_shared::models::{Attributes, Level};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status (always "healthy" if reachable).
    pub status: String,
    /// Service name.
    pub service: String,
    /// Service version.
    pub version: String,
    /// Seconds since the server state was built.
    pub uptime_secs: u64,
    /// Deployment environment.
    pub environment: String,
}

/// Creates the health check routes.
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
///
/// Returns a simple JSON response indicating the service is healthy.
/// This endpoint is intended for use by load balancers and monitoring systems.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    state
        .emitter()
        .emit_log(Level::Info, "Health check accessed", Attributes::new());

    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "lookout-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime().as_secs(),
        environment: state.environment().to_string(),
    })
}
