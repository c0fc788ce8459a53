//! Configuration module for Lookout.
//!
//! This module contains the log sink endpoint settings shared by the
//! emitter and the CLI.

pub mod sink;

pub use sink::{EndpointError, SinkEndpoint, DEFAULT_SINK_TIMEOUT, LOKI_PORT, LOKI_PUSH_PATH};
