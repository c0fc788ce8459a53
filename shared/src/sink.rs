//! HTTP client for the log sink push API.
//!
//! A push is a single POST with no retry. Callers decide what to do with a
//! failure; the telemetry emitter absorbs it, the CLI reports it.

use std::time::Duration;
use thiserror::Error;

use crate::config::SinkEndpoint;
use crate::push::PushRequest;

/// Errors returned by a push attempt.
#[derive(Debug, Error)]
pub enum PushError {
    /// The request did not complete within the endpoint timeout.
    #[error("Log sink did not respond within {0:?}")]
    Timeout(Duration),

    /// Connection, DNS, or protocol failure.
    #[error("Log sink transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The sink answered with a non-2xx status.
    #[error("Log sink rejected push with status {0}")]
    Status(u16),

    /// The underlying HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Client for a single log sink endpoint.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct LogSinkClient {
    http: reqwest::Client,
    endpoint: SinkEndpoint,
    push_url: String,
}

impl LogSinkClient {
    /// Creates a client for the endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::Client`] if the HTTP client cannot be built
    /// (e.g. the TLS backend fails to initialize).
    pub fn new(endpoint: SinkEndpoint) -> Result<Self, PushError> {
        let http = reqwest::Client::builder()
            .timeout(endpoint.timeout)
            .connect_timeout(endpoint.timeout)
            .build()
            .map_err(PushError::Client)?;
        let push_url = endpoint.push_url();

        Ok(Self {
            http,
            endpoint,
            push_url,
        })
    }

    /// The endpoint this client pushes to.
    #[must_use]
    pub fn endpoint(&self) -> &SinkEndpoint {
        &self.endpoint
    }

    /// Sends one push. Exactly one HTTP request is made.
    ///
    /// # Errors
    ///
    /// Returns an error if the request times out, fails in transport, or
    /// the sink responds with a non-2xx status.
    pub async fn push(&self, request: &PushRequest) -> Result<(), PushError> {
        let timeout = self.endpoint.timeout;
        let send = self.http.post(&self.push_url).json(request).send();

        let response = match tokio::time::timeout(timeout, send).await {
            Err(_) => return Err(PushError::Timeout(timeout)),
            Ok(Err(e)) if e.is_timeout() => return Err(PushError::Timeout(timeout)),
            Ok(Err(e)) => return Err(PushError::Transport(e)),
            Ok(Ok(response)) => response,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(PushError::Status(status.as_u16()));
        }

        tracing::trace!(
            url = %self.push_url,
            entries = request.entry_count(),
            "Log push accepted"
        );
        Ok(())
    }
}
