//! API route definitions.
//!
//! This module organizes all HTTP routes for the Lookout API server.

mod demo;
mod health;
mod metrics;

pub use demo::{demo_routes, PortfolioCreated, PortfolioRequest};
pub use health::{health_routes, HealthResponse};
pub use metrics::metrics_routes;

use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::Json;
use lookout_shared::attributes;
use lookout_shared::models::Level;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// JSON body returned by failing routes.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short error category.
    pub error: String,
    /// Human-readable detail.
    pub message: String,
}

impl ErrorResponse {
    pub(crate) fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

/// Fallback handler for unmatched routes.
pub async fn not_found(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
) -> (StatusCode, Json<ErrorResponse>) {
    state.emitter().emit_log(
        Level::Warn,
        "Route not found",
        attributes! {
            "method" => method.as_str(),
            "path" => uri.path(),
        },
    );

    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new(
            "Not found",
            format!("Route {method} {} not found", uri.path()),
        )),
    )
}
