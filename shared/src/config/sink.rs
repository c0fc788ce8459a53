//! Log sink endpoint configuration.
//!
//! The sink address is built once at startup from a host name, a fixed port
//! and a fixed push path, and is read-only afterwards.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Port the log sink listens on.
pub const LOKI_PORT: u16 = 3100;

/// Path of the push API on the log sink.
pub const LOKI_PUSH_PATH: &str = "/loki/api/v1/push";

/// Upper bound on a single push request.
pub const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors raised while building a sink endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    /// The host or base URL is empty.
    #[error("Sink host cannot be empty")]
    EmptyHost,

    /// The push path does not start with `/`.
    #[error("Push path must start with '/': '{0}'")]
    InvalidPushPath(String),

    /// A zero timeout would fail every push.
    #[error("Sink timeout must be greater than zero")]
    ZeroTimeout,
}

/// Where and how log pushes are sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkEndpoint {
    /// Scheme, host and port, without a trailing slash.
    pub base_url: String,
    /// Path of the push API, starting with `/`.
    pub push_path: String,
    /// Bound on each push request.
    pub timeout: Duration,
}

impl SinkEndpoint {
    /// Creates an endpoint from explicit parts.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `base_url` is empty
    /// - `push_path` does not start with `/`
    /// - `timeout` is zero
    pub fn new(
        base_url: impl Into<String>,
        push_path: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, EndpointError> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        let push_path = push_path.into();

        if base_url.is_empty() {
            return Err(EndpointError::EmptyHost);
        }
        if !push_path.starts_with('/') {
            return Err(EndpointError::InvalidPushPath(push_path));
        }
        if timeout.is_zero() {
            return Err(EndpointError::ZeroTimeout);
        }

        Ok(Self {
            base_url,
            push_path,
            timeout,
        })
    }

    /// Builds the endpoint from a bare sink host, using the fixed port and
    /// push path. A host without a scheme is given `http://`.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::EmptyHost`] if `host` is blank.
    ///
    /// # Examples
    ///
    /// ```
    /// use lookout_shared::config::SinkEndpoint;
    ///
    /// let endpoint = SinkEndpoint::from_host("alloy.internal").unwrap();
    /// assert_eq!(endpoint.push_url(), "http://alloy.internal:3100/loki/api/v1/push");
    /// ```
    pub fn from_host(host: &str) -> Result<Self, EndpointError> {
        let host = host.trim().trim_end_matches('/');
        if host.is_empty() {
            return Err(EndpointError::EmptyHost);
        }

        let base = if host.contains("://") {
            format!("{host}:{LOKI_PORT}")
        } else {
            format!("http://{host}:{LOKI_PORT}")
        };
        Self::new(base, LOKI_PUSH_PATH, DEFAULT_SINK_TIMEOUT)
    }

    /// Returns a copy with a different timeout.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::ZeroTimeout`] if `timeout` is zero.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, EndpointError> {
        if timeout.is_zero() {
            return Err(EndpointError::ZeroTimeout);
        }
        self.timeout = timeout;
        Ok(self)
    }

    /// Full URL of the push API.
    #[must_use]
    pub fn push_url(&self) -> String {
        format!("{}{}", self.base_url, self.push_path)
    }
}
