//! Application state module.
//!
//! Defines the shared application state that is passed to route handlers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use lookout_shared::models::MetricDefinition;
use lookout_shared::registry::MetricsRegistry;

use crate::config::Config;
use crate::emitter::TelemetryEmitter;

/// Counter incremented by the demo portfolio route.
pub const PORTFOLIOS_CREATED_TOTAL: &str = "portfolios_created_total";

/// Application-specific metric definitions registered next to the HTTP set.
#[must_use]
pub fn app_metric_definitions() -> Vec<MetricDefinition> {
    vec![MetricDefinition::counter(
        PORTFOLIOS_CREATED_TOTAL,
        "Total number of portfolios created",
        &["portfolio_type"],
    )]
}

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Telemetry emitter for logs and metrics.
    emitter: TelemetryEmitter,
    /// Deployment environment reported by `/health`.
    environment: Arc<str>,
    /// Process start, for uptime reporting.
    started_at: Instant,
    /// Sequence for demo portfolio identifiers.
    portfolio_ids: Arc<AtomicU64>,
}

impl AppState {
    /// Creates a new application state around an emitter.
    #[must_use]
    pub fn new(emitter: TelemetryEmitter, environment: impl Into<Arc<str>>) -> Self {
        Self {
            emitter,
            environment: environment.into(),
            started_at: Instant::now(),
            portfolio_ids: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Builds the registry and emitter described by the configuration.
    ///
    /// Must be called inside a Tokio runtime for log shipping to start.
    ///
    /// # Errors
    ///
    /// Returns an error if the metric definitions cannot be registered.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let registry = Arc::new(MetricsRegistry::with_http_defaults(app_metric_definitions())?);
        let emitter = TelemetryEmitter::new(config.emitter_settings(), registry);
        Ok(Self::new(emitter, config.environment.as_str()))
    }

    /// Creates a state whose emitter keeps metrics but discards log events.
    ///
    /// This is useful for development and testing.
    ///
    /// # Panics
    ///
    /// Panics if the built-in metric definitions are rejected, which would be
    /// a bug in this crate.
    #[must_use]
    pub fn without_sink() -> Self {
        let registry = MetricsRegistry::with_http_defaults(app_metric_definitions())
            .expect("built-in metric definitions are valid");
        Self::new(TelemetryEmitter::disabled(Arc::new(registry)), "test")
    }

    /// Returns the telemetry emitter.
    #[must_use]
    pub fn emitter(&self) -> &TelemetryEmitter {
        &self.emitter
    }

    /// Returns the deployment environment name.
    #[must_use]
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Time since the state was created.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub(crate) fn next_portfolio_id(&self) -> u64 {
        self.portfolio_ids.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::without_sink()
    }
}
