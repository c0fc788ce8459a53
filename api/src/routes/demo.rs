//! Placeholder business routes used to exercise the telemetry pipeline.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lookout_shared::attributes;
use lookout_shared::models::{AttributeValue, Attributes, Level, MetricSample};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use super::ErrorResponse;
use crate::state::{AppState, PORTFOLIOS_CREATED_TOTAL};

/// Request body for portfolio creation.
#[derive(Debug, Deserialize)]
pub struct PortfolioRequest {
    /// Owner of the portfolio (required); any JSON scalar.
    pub user_id: Option<AttributeValue>,
    /// Portfolio category (defaults to "standard").
    #[serde(default = "default_portfolio_type")]
    pub portfolio_type: String,
}

fn default_portfolio_type() -> String {
    "standard".to_string()
}

/// Response for a created portfolio.
#[derive(Debug, Serialize, Deserialize)]
pub struct PortfolioCreated {
    /// Assigned identifier.
    pub id: u64,
    /// Always "created".
    pub status: String,
}

#[derive(Debug, Error)]
enum PortfolioError {
    #[error("invalid request body: {0}")]
    InvalidBody(String),
    #[error("user_id is required")]
    MissingUserId,
}

/// Creates the demonstration routes.
pub fn demo_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/api/portfolio", post(create_portfolio))
}

/// Index of the available endpoints.
async fn root(State(state): State<AppState>) -> Json<Value> {
    state
        .emitter()
        .emit_log(Level::Info, "Root endpoint accessed", Attributes::new());

    Json(json!({
        "service": "lookout-api",
        "endpoints": {
            "health": "/health",
            "metrics": "/metrics",
            "portfolio": "/api/portfolio",
        },
    }))
}

/// Creates a portfolio.
///
/// Returns 201 Created on success, 400 Bad Request when the body is not
/// valid JSON or `user_id` is missing.
async fn create_portfolio(
    State(state): State<AppState>,
    payload: Result<Json<PortfolioRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PortfolioCreated>), (StatusCode, Json<ErrorResponse>)> {
    let emitter = state.emitter();

    let Json(request) = payload.map_err(|rejection| {
        reject(&state, &PortfolioError::InvalidBody(rejection.body_text()))
    })?;

    emitter.emit_log(
        Level::Info,
        "Creating portfolio",
        attributes! {
            "user_id" => request.user_id.clone(),
            "portfolio_type" => &request.portfolio_type,
        },
    );

    let user_id = match request.user_id {
        Some(AttributeValue::String(id)) if id.trim().is_empty() => None,
        Some(AttributeValue::Null) | None => None,
        Some(id) => Some(id),
    }
    .ok_or_else(|| reject(&state, &PortfolioError::MissingUserId))?;

    let id = state.next_portfolio_id();
    emitter.emit_metric(
        &MetricSample::counter(PORTFOLIOS_CREATED_TOTAL)
            .with_label("portfolio_type", request.portfolio_type),
    );
    emitter.emit_log(
        Level::Info,
        "Portfolio created successfully",
        attributes! {
            "portfolio_id" => id,
            "user_id" => user_id,
        },
    );

    Ok((
        StatusCode::CREATED,
        Json(PortfolioCreated {
            id,
            status: "created".to_string(),
        }),
    ))
}

/// Logs the failure and maps it to a 400 response.
fn reject(state: &AppState, error: &PortfolioError) -> (StatusCode, Json<ErrorResponse>) {
    state
        .emitter()
        .record_failure("Failed to create portfolio", error, Attributes::new());
    let kind = match error {
        PortfolioError::InvalidBody(_) => "invalid_json",
        PortfolioError::MissingUserId => "missing_field",
    };
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new(kind, error.to_string())),
    )
}
