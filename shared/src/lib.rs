//! Lookout Shared Library
//!
//! This crate contains the telemetry primitives used across the Lookout
//! workspace: structured log events, metric samples, the log sink wire
//! envelope and HTTP client, and the in-process metrics registry.
//!
//! # Modules
//!
//! - [`models`] - Events, levels, attributes and metric samples
//! - [`push`] - The push envelope accepted by the log sink
//! - [`sink`] - HTTP client delivering push envelopes
//! - [`registry`] - Counter/histogram/gauge aggregation and scrape output
//! - [`config`] - Sink endpoint configuration
//! - [`clock`] - Monotonic timestamps for log events
//!
//! # Example
//!
//! ```
//! use lookout_shared::attributes;
//! use lookout_shared::models::{Event, Level};
//!
//! let event = Event::new(Level::Info, "User logged in")
//!     .unwrap()
//!     .with_attributes(attributes! { "user_id" => 12345 });
//!
//! assert_eq!(event.attributes().len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod clock;
pub mod config;
pub mod models;
pub mod push;
pub mod registry;
pub mod sink;

/// Re-export common dependencies for convenience.
pub use chrono;
pub use indexmap;
pub use serde_json;
