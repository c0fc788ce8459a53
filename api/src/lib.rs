//! Lookout API Server
//!
//! This crate provides an HTTP server instrumented with a best-effort
//! telemetry emitter. Every request is logged to a remote log sink and
//! measured into an in-process metrics registry that scrapers read from
//! `/metrics`.
//!
//! # Architecture
//!
//! The API server is built on Axum and Tokio, providing:
//! - An observability middleware that logs and measures every request
//! - A detached delivery worker that ships log events without touching
//!   request latency
//! - A scrape endpoint in the Prometheus text format
//!
//! # Example
//!
//! ```no_run
//! use api::run_server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     run_server().await
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod config;
pub mod emitter;
pub mod middleware;
pub mod routes;
mod state;

pub use config::Config;
pub use emitter::{DeliveryStats, EmitterSettings, MetricsExposition, TelemetryEmitter};
pub use state::{app_metric_definitions, AppState, PORTFOLIOS_CREATED_TOTAL};

use anyhow::Result;
use axum::Router;
use lookout_shared::attributes;
use lookout_shared::models::Level;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Runs the Lookout API server.
///
/// This function initializes the server with configuration from environment variables
/// and starts listening for incoming connections. It handles graceful shutdown on
/// SIGTERM/SIGINT signals.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration cannot be loaded from environment
/// - The server fails to bind to the configured address
/// - A fatal error occurs during operation
pub async fn run_server() -> Result<()> {
    let config = Config::from_env()?;
    run_server_with_config(config).await
}

/// Runs the Lookout API server with the provided configuration.
///
/// Queued log events are flushed after the listener stops.
///
/// # Errors
///
/// Returns an error if:
/// - The metric definitions are rejected
/// - The server fails to bind to the configured address
/// - A fatal error occurs during operation
pub async fn run_server_with_config(config: Config) -> Result<()> {
    let addr = config.socket_addr()?;

    tracing::info!(
        host = %config.host,
        port = %config.port,
        environment = %config.environment,
        "Lookout API server starting"
    );

    let state = AppState::from_config(&config)?;
    let emitter = state.emitter().clone();
    let app = create_router(state);
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(%addr, "Listening for connections");
    emitter.emit_log(
        Level::Info,
        "Server started successfully",
        attributes! {
            "host" => &config.host,
            "port" => config.port,
        },
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(emitter.clone()))
    .await?;

    emitter.shutdown().await;
    tracing::info!(stats = ?emitter.stats(), "Server shutdown complete");
    Ok(())
}

/// Creates the main application router with all routes and middleware.
///
/// This function is public to allow testing the router without starting a full server.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health_routes())
        .merge(routes::metrics_routes())
        .merge(routes::demo_routes())
        .fallback(routes::not_found)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::observability_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal(emitter: TelemetryEmitter) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal = tokio::select! {
        () = ctrl_c => "SIGINT",
        () = terminate => "SIGTERM",
    };

    tracing::info!(signal, "Starting graceful shutdown");
    emitter.emit_log(
        Level::Info,
        format!("Received {signal}, shutting down gracefully"),
        attributes! { "signal" => signal },
    );
}
