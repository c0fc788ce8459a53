//! Metric sample and metric definition models.
//!
//! A `MetricSample` is a single update handed to the in-process registry. A
//! `MetricDefinition` declares the name, label schema and type of a metric
//! once at startup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use validator::Validate;

/// Label set attached to a sample, keyed by label name.
pub type LabelSet = BTreeMap<String, String>;

/// Type of metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// A counter that only increases (e.g., request count).
    Counter,
    /// A histogram for measuring distributions (e.g., request latency).
    Histogram,
    /// A gauge that can go up or down (e.g., in-flight requests).
    Gauge,
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Counter => write!(f, "counter"),
            Self::Histogram => write!(f, "histogram"),
            Self::Gauge => write!(f, "gauge"),
        }
    }
}

/// A single metric update.
///
/// # Example
///
/// ```
/// use lookout_shared::models::{MetricKind, MetricSample};
///
/// let sample = MetricSample::counter("http_requests_total")
///     .with_label("method", "GET")
///     .with_label("status", "200");
///
/// assert_eq!(sample.kind(), MetricKind::Counter);
/// assert_eq!(sample.labels().map(|l| l.len()), Some(2));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetricSample {
    /// Increment a counter by one.
    Counter {
        /// Metric name.
        name: String,
        /// Label values, keyed by the metric's label names.
        #[serde(default)]
        labels: LabelSet,
    },
    /// Record one observation in a histogram.
    Histogram {
        /// Metric name.
        name: String,
        /// Label values, keyed by the metric's label names.
        #[serde(default)]
        labels: LabelSet,
        /// Observed value.
        value: f64,
    },
    /// Move a gauge up or down.
    Gauge {
        /// Metric name.
        name: String,
        /// Signed change applied to the gauge.
        delta: i64,
    },
}

impl MetricSample {
    /// Creates a counter increment with no labels.
    #[must_use]
    pub fn counter(name: impl Into<String>) -> Self {
        Self::Counter {
            name: name.into(),
            labels: LabelSet::new(),
        }
    }

    /// Creates a histogram observation with no labels.
    #[must_use]
    pub fn histogram(name: impl Into<String>, value: f64) -> Self {
        Self::Histogram {
            name: name.into(),
            labels: LabelSet::new(),
            value,
        }
    }

    /// Creates a gauge adjustment.
    #[must_use]
    pub fn gauge(name: impl Into<String>, delta: i64) -> Self {
        Self::Gauge {
            name: name.into(),
            delta,
        }
    }

    /// Adds a label. Gauges are unlabeled and ignore it.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        match &mut self {
            Self::Counter { labels, .. } | Self::Histogram { labels, .. } => {
                labels.insert(key.into(), value.into());
            }
            Self::Gauge { .. } => {}
        }
        self
    }

    /// Metric name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Counter { name, .. } | Self::Histogram { name, .. } | Self::Gauge { name, .. } => {
                name
            }
        }
    }

    /// Label set, or `None` for gauges.
    #[must_use]
    pub fn labels(&self) -> Option<&LabelSet> {
        match self {
            Self::Counter { labels, .. } | Self::Histogram { labels, .. } => Some(labels),
            Self::Gauge { .. } => None,
        }
    }

    /// The kind of metric this sample updates.
    #[must_use]
    pub fn kind(&self) -> MetricKind {
        match self {
            Self::Counter { .. } => MetricKind::Counter,
            Self::Histogram { .. } => MetricKind::Histogram,
            Self::Gauge { .. } => MetricKind::Gauge,
        }
    }
}

/// Declaration of a metric registered at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct MetricDefinition {
    /// The name of the metric (e.g., "`http_requests_total`").
    #[validate(length(min = 1, message = "Metric name cannot be empty"))]
    pub name: String,

    /// Help text shown in the scrape output.
    #[validate(length(min = 1, message = "Metric help cannot be empty"))]
    pub help: String,

    /// The type of metric.
    pub kind: MetricKind,

    /// Fixed label names. Always empty for gauges.
    #[serde(default)]
    pub labels: Vec<String>,

    /// Histogram bucket upper bounds. Ignored for other kinds.
    #[serde(default)]
    pub buckets: Vec<f64>,
}

/// Errors that can occur during metric definition validation.
#[derive(Debug, Error)]
pub enum MetricValidationError {
    /// The metric name is empty.
    #[error("Metric name cannot be empty")]
    EmptyName,

    /// The metric name contains characters outside `[a-zA-Z0-9_:]`.
    #[error("Invalid metric name: '{0}'")]
    InvalidName(String),

    /// Invalid label name.
    #[error("Invalid label name: '{0}'")]
    InvalidLabelName(String),

    /// Histogram has invalid buckets.
    #[error("Histogram buckets must be sorted in ascending order")]
    InvalidHistogramBuckets,

    /// Gauges are unlabeled.
    #[error("Gauge '{0}' cannot declare labels")]
    LabeledGauge(String),

    /// Validation failed with details.
    #[error("Validation failed: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

impl MetricDefinition {
    /// Declares a counter with the given label names.
    #[must_use]
    pub fn counter(name: impl Into<String>, help: impl Into<String>, labels: &[&str]) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            kind: MetricKind::Counter,
            labels: labels.iter().map(ToString::to_string).collect(),
            buckets: Vec::new(),
        }
    }

    /// Declares a histogram with the given label names and bucket bounds.
    #[must_use]
    pub fn histogram(
        name: impl Into<String>,
        help: impl Into<String>,
        labels: &[&str],
        buckets: &[f64],
    ) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            kind: MetricKind::Histogram,
            labels: labels.iter().map(ToString::to_string).collect(),
            buckets: buckets.to_vec(),
        }
    }

    /// Declares an unlabeled gauge.
    #[must_use]
    pub fn gauge(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            kind: MetricKind::Gauge,
            labels: Vec::new(),
            buckets: Vec::new(),
        }
    }

    /// Validates the definition.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The name is empty or not a valid exposition-format name
    /// - A label name is invalid
    /// - Histogram buckets are not strictly ascending
    /// - A gauge declares labels
    pub fn validate_definition(&self) -> Result<(), MetricValidationError> {
        if self.name.is_empty() {
            return Err(MetricValidationError::EmptyName);
        }
        if !is_valid_metric_name(&self.name) {
            return Err(MetricValidationError::InvalidName(self.name.clone()));
        }
        if let Some(bad) = self.labels.iter().find(|l| !is_valid_label_name(l)) {
            return Err(MetricValidationError::InvalidLabelName(bad.clone()));
        }
        if self.kind == MetricKind::Histogram && self.buckets.windows(2).any(|w| w[1] <= w[0]) {
            return Err(MetricValidationError::InvalidHistogramBuckets);
        }
        if self.kind == MetricKind::Gauge && !self.labels.is_empty() {
            return Err(MetricValidationError::LabeledGauge(self.name.clone()));
        }

        self.validate()?;
        Ok(())
    }
}

fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == ':')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with("__")
}

/// A histogram bucket in a registry snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBucket {
    /// The upper bound of this bucket (inclusive).
    pub upper_bound: f64,
    /// The cumulative count of observations in this bucket.
    pub count: u64,
}

/// Point-in-time view of one histogram series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramData {
    /// The histogram buckets.
    pub buckets: Vec<HistogramBucket>,
    /// The sum of all observed values.
    pub sum: f64,
    /// The total count of observations.
    pub count: u64,
}
