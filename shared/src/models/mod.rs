//! Data models for Lookout telemetry.
//!
//! This module contains the structured log event and the metric sample types.

pub mod event;
pub mod metric;

pub use event::{AttributeValue, Attributes, Event, EventError, Level, LevelParseError};
pub use metric::{
    HistogramBucket, HistogramData, LabelSet, MetricDefinition, MetricKind, MetricSample,
    MetricValidationError,
};
