//! In-process metrics registry.
//!
//! Metrics are declared once from explicit [`MetricDefinition`]s. After that
//! the only mutation path is [`MetricsRegistry::record`] (atomic
//! increment/observe/add) and the only read paths are the snapshot
//! accessors and [`MetricsRegistry::render`]. Every update is a lock-free
//! atomic operation inside the `prometheus` collectors, so the registry can
//! be shared across request handlers behind an `Arc`.

use prometheus::core::Collector;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::collections::HashMap;
use thiserror::Error;

use crate::models::{
    HistogramBucket, HistogramData, LabelSet, MetricDefinition, MetricKind, MetricSample,
    MetricValidationError,
};

/// Content type of the text exposition format.
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

/// Name of the request counter in the standard HTTP metric set.
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
/// Name of the request duration histogram in the standard HTTP metric set.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
/// Name of the in-flight request gauge in the standard HTTP metric set.
pub const HTTP_ACTIVE_CONNECTIONS: &str = "http_active_connections";

/// Label names shared by the HTTP counter and histogram.
pub const HTTP_LABELS: [&str; 3] = ["method", "endpoint", "status"];

/// Bucket bounds (seconds) for the request duration histogram.
pub const HTTP_DURATION_BUCKETS: [f64; 8] = [0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0];

/// Errors from registry construction, recording or rendering.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A definition failed validation.
    #[error("Invalid metric definition: {0}")]
    InvalidDefinition(#[from] MetricValidationError),

    /// Two definitions share a name.
    #[error("Metric '{0}' is defined more than once")]
    DuplicateMetric(String),

    /// A sample names a metric that was never defined.
    #[error("Unknown metric '{0}'")]
    UnknownMetric(String),

    /// A sample's kind differs from the definition.
    #[error("Metric '{name}' is a {expected}, sample is a {actual}")]
    KindMismatch {
        /// Metric name.
        name: String,
        /// Kind declared at startup.
        expected: MetricKind,
        /// Kind of the offending sample.
        actual: MetricKind,
    },

    /// A sample's label keys differ from the definition's schema.
    #[error("Metric '{name}' expects labels {expected:?}, got {actual:?}")]
    LabelMismatch {
        /// Metric name.
        name: String,
        /// Label names declared at startup.
        expected: Vec<String>,
        /// Label names present on the sample.
        actual: Vec<String>,
    },

    /// Error reported by the underlying collectors or encoder.
    #[error("Metrics backend error: {0}")]
    Backend(#[from] prometheus::Error),

    /// The encoded exposition was not valid UTF-8.
    #[error("Metrics output was not valid UTF-8")]
    InvalidUtf8,
}

enum Handle {
    Counter(IntCounterVec),
    Histogram(HistogramVec),
    Gauge(IntGauge),
}

struct Entry {
    definition: MetricDefinition,
    handle: Handle,
}

/// Registry of counters, histograms and gauges with a fixed schema.
pub struct MetricsRegistry {
    registry: Registry,
    entries: HashMap<String, Entry>,
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.entries.keys().collect();
        names.sort();
        f.debug_struct("MetricsRegistry")
            .field("metrics", &names)
            .finish()
    }
}

impl MetricsRegistry {
    /// Builds a registry from explicit definitions.
    ///
    /// # Errors
    ///
    /// Returns an error if a definition is invalid, a name is repeated, or
    /// the collector cannot be registered.
    pub fn new(definitions: impl IntoIterator<Item = MetricDefinition>) -> Result<Self, RegistryError> {
        let registry = Registry::new();
        let mut entries = HashMap::new();

        for definition in definitions {
            definition.validate_definition()?;
            if entries.contains_key(&definition.name) {
                return Err(RegistryError::DuplicateMetric(definition.name));
            }

            let labels: Vec<&str> = definition.labels.iter().map(String::as_str).collect();
            let handle = match definition.kind {
                MetricKind::Counter => {
                    let counter =
                        IntCounterVec::new(Opts::new(&definition.name, &definition.help), &labels)?;
                    registry.register(Box::new(counter.clone()))?;
                    Handle::Counter(counter)
                }
                MetricKind::Histogram => {
                    let mut opts = HistogramOpts::new(&definition.name, &definition.help);
                    if !definition.buckets.is_empty() {
                        opts = opts.buckets(definition.buckets.clone());
                    }
                    let histogram = HistogramVec::new(opts, &labels)?;
                    registry.register(Box::new(histogram.clone()))?;
                    Handle::Histogram(histogram)
                }
                MetricKind::Gauge => {
                    let gauge =
                        IntGauge::with_opts(Opts::new(&definition.name, &definition.help))?;
                    registry.register(Box::new(gauge.clone()))?;
                    Handle::Gauge(gauge)
                }
            };

            entries.insert(definition.name.clone(), Entry { definition, handle });
        }

        Ok(Self { registry, entries })
    }

    /// Builds a registry with the standard HTTP metric set
    /// (`http_requests_total`, `http_request_duration_seconds`,
    /// `http_active_connections`) plus any extra definitions.
    ///
    /// # Errors
    ///
    /// Returns an error under the same conditions as [`MetricsRegistry::new`].
    pub fn with_http_defaults(
        extra: impl IntoIterator<Item = MetricDefinition>,
    ) -> Result<Self, RegistryError> {
        Self::new(http_definitions().into_iter().chain(extra))
    }

    /// Applies a sample, or explains why it does not fit the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the metric is unknown, the kind differs, or the
    /// label keys do not match the definition.
    pub fn try_record(&self, sample: &MetricSample) -> Result<(), RegistryError> {
        let entry = self
            .entries
            .get(sample.name())
            .ok_or_else(|| RegistryError::UnknownMetric(sample.name().to_string()))?;

        if entry.definition.kind != sample.kind() {
            return Err(RegistryError::KindMismatch {
                name: sample.name().to_string(),
                expected: entry.definition.kind,
                actual: sample.kind(),
            });
        }

        match (&entry.handle, sample) {
            (Handle::Counter(counter), MetricSample::Counter { labels, .. }) => {
                let values = label_values(&entry.definition, labels)?;
                counter.get_metric_with(&values)?.inc();
            }
            (Handle::Histogram(histogram), MetricSample::Histogram { labels, value, .. }) => {
                let values = label_values(&entry.definition, labels)?;
                histogram.get_metric_with(&values)?.observe(*value);
            }
            (Handle::Gauge(gauge), MetricSample::Gauge { delta, .. }) => gauge.add(*delta),
            _ => {
                return Err(RegistryError::KindMismatch {
                    name: sample.name().to_string(),
                    expected: entry.definition.kind,
                    actual: sample.kind(),
                })
            }
        }

        Ok(())
    }

    /// Applies a sample. A schema violation is a programming error: it is
    /// logged at error level and the sample is dropped.
    pub fn record(&self, sample: &MetricSample) {
        if let Err(e) = self.try_record(sample) {
            tracing::error!(metric = sample.name(), error = %e, "Dropped invalid metric sample");
        }
    }

    /// Current value of a counter series, or `None` if it was never touched.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn counter_value(&self, name: &str, labels: &LabelSet) -> Option<u64> {
        let entry = self.entries.get(name)?;
        let Handle::Counter(counter) = &entry.handle else {
            return None;
        };
        find_series(counter, labels).map(|m| m.get_counter().get_value() as u64)
    }

    /// Current value of a gauge.
    #[must_use]
    pub fn gauge_value(&self, name: &str) -> Option<i64> {
        match &self.entries.get(name)?.handle {
            Handle::Gauge(gauge) => Some(gauge.get()),
            _ => None,
        }
    }

    /// Cumulative buckets, sum and count of a histogram series.
    #[must_use]
    pub fn histogram_snapshot(&self, name: &str, labels: &LabelSet) -> Option<HistogramData> {
        let entry = self.entries.get(name)?;
        let Handle::Histogram(histogram) = &entry.handle else {
            return None;
        };
        find_series(histogram, labels).map(|m| {
            let h = m.get_histogram();
            HistogramData {
                buckets: h
                    .get_bucket()
                    .iter()
                    .map(|b| HistogramBucket {
                        upper_bound: b.get_upper_bound(),
                        count: b.get_cumulative_count(),
                    })
                    .collect(),
                sum: h.get_sample_sum(),
                count: h.get_sample_count(),
            }
        })
    }

    /// Names of all registered metrics, sorted.
    #[must_use]
    pub fn metric_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Renders every registered metric in the text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or produces invalid UTF-8.
    pub fn render(&self) -> Result<String, RegistryError> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|_| RegistryError::InvalidUtf8)
    }
}

/// The standard HTTP metric definitions.
#[must_use]
pub fn http_definitions() -> Vec<MetricDefinition> {
    vec![
        MetricDefinition::counter(HTTP_REQUESTS_TOTAL, "Total HTTP requests", &HTTP_LABELS),
        MetricDefinition::histogram(
            HTTP_REQUEST_DURATION_SECONDS,
            "HTTP request duration in seconds",
            &HTTP_LABELS,
            &HTTP_DURATION_BUCKETS,
        ),
        MetricDefinition::gauge(
            HTTP_ACTIVE_CONNECTIONS,
            "Number of HTTP requests currently being handled",
        ),
    ]
}

fn label_values<'a>(
    definition: &MetricDefinition,
    labels: &'a LabelSet,
) -> Result<HashMap<&'a str, &'a str>, RegistryError> {
    let matches = labels.len() == definition.labels.len()
        && definition.labels.iter().all(|l| labels.contains_key(l));
    if !matches {
        return Err(RegistryError::LabelMismatch {
            name: definition.name.clone(),
            expected: definition.labels.clone(),
            actual: labels.keys().cloned().collect(),
        });
    }

    Ok(labels
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect())
}

fn find_series(collector: &impl Collector, labels: &LabelSet) -> Option<prometheus::proto::Metric> {
    collector
        .collect()
        .into_iter()
        .flat_map(|mut family| family.take_metric().into_vec())
        .find(|metric| {
            let pairs = metric.get_label();
            pairs.len() == labels.len()
                && pairs
                    .iter()
                    .all(|p| labels.get(p.get_name()).is_some_and(|v| v == p.get_value()))
        })
}
