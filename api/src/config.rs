//! Server configuration module.
//!
//! Handles loading configuration from environment variables with sensible defaults.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;

use lookout_shared::config::{SinkEndpoint, DEFAULT_SINK_TIMEOUT};
use lookout_shared::push::PushContext;

use crate::emitter::{EmitterSettings, DEFAULT_BATCH_SIZE, DEFAULT_QUEUE_CAPACITY};

/// Server configuration.
///
/// Configuration values can be set via environment variables:
/// - `LOOKOUT_HOST`: The host address to bind to (default: "0.0.0.0")
/// - `LOOKOUT_PORT`: The port to listen on (default: 8080)
/// - `GRAFANA_ALLOY_HOST`: Log sink host; port 3100 and the push path are
///   appended. Unset disables log shipping.
/// - `LOOKOUT_SINK_TIMEOUT_MS`: Push timeout (default: 5000)
/// - `LOOKOUT_APP`, `LOOKOUT_SERVICE`: Stream labels
/// - `LOOKOUT_ENV`: Environment name (default: "development")
/// - `LOOKOUT_QUEUE_CAPACITY`: Buffered events before dropping (default: 1024)
/// - `LOOKOUT_DEBUG_LOGS`: Ship debug events (default: true in development)
#[derive(Debug, Clone)]
pub struct Config {
    /// The host address to bind to.
    pub host: String,
    /// The port to listen on.
    pub port: u16,
    /// Log sink endpoint, if configured.
    pub sink: Option<SinkEndpoint>,
    /// Value of the `app` stream label.
    pub app: String,
    /// Value of the `service` stream label.
    pub service: String,
    /// Deployment environment.
    pub environment: String,
    /// Event queue capacity.
    pub queue_capacity: usize,
    /// Whether debug events are shipped.
    pub debug_logs: bool,
}

impl Config {
    /// Creates a new configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric or boolean variable cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates a configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric or boolean variable cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let host = var("LOOKOUT_HOST").unwrap_or(defaults.host);
        let port = var("LOOKOUT_PORT")
            .map(|p| p.parse::<u16>())
            .transpose()
            .context("LOOKOUT_PORT must be a valid port number")?
            .unwrap_or(defaults.port);

        let timeout = var("LOOKOUT_SINK_TIMEOUT_MS")
            .map(|t| t.parse::<u64>().map(Duration::from_millis))
            .transpose()
            .context("LOOKOUT_SINK_TIMEOUT_MS must be a number of milliseconds")?
            .unwrap_or(DEFAULT_SINK_TIMEOUT);

        let sink = var("GRAFANA_ALLOY_HOST")
            .map(|h| SinkEndpoint::from_host(&h).and_then(|e| e.with_timeout(timeout)))
            .transpose()
            .context("GRAFANA_ALLOY_HOST is not a usable sink host")?;

        let environment = var("LOOKOUT_ENV").unwrap_or(defaults.environment);

        let queue_capacity = var("LOOKOUT_QUEUE_CAPACITY")
            .map(|c| c.parse::<usize>())
            .transpose()
            .context("LOOKOUT_QUEUE_CAPACITY must be a positive integer")?
            .unwrap_or(defaults.queue_capacity);

        let debug_logs = match var("LOOKOUT_DEBUG_LOGS") {
            Some(v) => parse_bool(&v).context("LOOKOUT_DEBUG_LOGS must be true or false")?,
            None => environment == "development",
        };

        Ok(Self {
            host,
            port,
            sink,
            app: var("LOOKOUT_APP").unwrap_or(defaults.app),
            service: var("LOOKOUT_SERVICE").unwrap_or(defaults.service),
            environment,
            queue_capacity,
            debug_logs,
        })
    }

    /// Returns the socket address for binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the host and port do not form a valid socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid socket address {}:{}", self.host, self.port))
    }

    /// Static identity stamped on pushed events.
    #[must_use]
    pub fn push_context(&self) -> PushContext {
        PushContext::new(&self.app, &self.service, &self.environment)
    }

    /// Settings for the telemetry emitter.
    #[must_use]
    pub fn emitter_settings(&self) -> EmitterSettings {
        EmitterSettings {
            sink: self.sink.clone(),
            context: self.push_context(),
            queue_capacity: self.queue_capacity,
            batch_size: DEFAULT_BATCH_SIZE,
            debug_enabled: self.debug_logs,
        }
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("unrecognized boolean '{other}'"),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            sink: None,
            app: "lookout-api".to_string(),
            service: "lookout".to_string(),
            environment: "development".to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            debug_logs: true,
        }
    }
}
