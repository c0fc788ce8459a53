//! Metrics scrape endpoint.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use lookout_shared::models::Attributes;

use super::ErrorResponse;
use crate::state::AppState;

/// Creates the scrape route.
pub fn metrics_routes() -> Router<AppState> {
    Router::new().route("/metrics", get(scrape_metrics))
}

/// Renders the registry in the text exposition format.
async fn scrape_metrics(State(state): State<AppState>) -> Response {
    match state.emitter().expose_metrics() {
        Ok(exposition) => (
            [(header::CONTENT_TYPE, exposition.content_type)],
            exposition.body,
        )
            .into_response(),
        Err(e) => {
            state
                .emitter()
                .record_failure("Failed to generate metrics", &e, Attributes::new());
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("metrics_unavailable", e.to_string())),
            )
                .into_response()
        }
    }
}
