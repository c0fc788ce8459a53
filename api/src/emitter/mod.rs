//! Best-effort telemetry emitter.
//!
//! The emitter sits beside the request path and forwards two kinds of
//! telemetry to independent sinks:
//!
//! ```text
//! emit_log(level, message, attributes)
//!     → Event (monotonic timestamp)
//!     → bounded queue (drop-oldest)          caller returns here
//!     → worker: batch → PushRequest → one POST to the log sink
//!
//! emit_metric(sample)
//!     → MetricsRegistry (atomic update)      scraped via /metrics
//! ```
//!
//! None of the public operations return an error that a request handler has
//! to deal with. Sink failures are counted in [`DeliveryStats`] and dropped.

mod queue;
mod worker;

use std::fmt::Display;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;

use lookout_shared::config::SinkEndpoint;
use lookout_shared::models::{AttributeValue, Attributes, Event, Level, MetricSample};
use lookout_shared::push::PushContext;
use lookout_shared::registry::{MetricsRegistry, RegistryError, CONTENT_TYPE};
use lookout_shared::sink::LogSinkClient;

use queue::{EventQueue, Offer};
use worker::{Counters, Delivery};

/// Default number of events buffered before the oldest is dropped.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Maximum number of events sent in one push.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Construction settings for [`TelemetryEmitter`].
#[derive(Debug, Clone)]
pub struct EmitterSettings {
    /// Log sink; `None` disables log shipping.
    pub sink: Option<SinkEndpoint>,
    /// Labels and static fields stamped on every event.
    pub context: PushContext,
    /// Queue capacity before drop-oldest kicks in.
    pub queue_capacity: usize,
    /// Maximum events per push.
    pub batch_size: usize,
    /// Whether `debug` events are shipped.
    pub debug_enabled: bool,
}

impl Default for EmitterSettings {
    fn default() -> Self {
        Self {
            sink: None,
            context: PushContext::new("lookout-api", "lookout", "development"),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            batch_size: DEFAULT_BATCH_SIZE,
            debug_enabled: false,
        }
    }
}

/// Snapshot of log delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryStats {
    /// Events accepted into the queue.
    pub enqueued: u64,
    /// Events discarded by overflow or after shutdown.
    pub dropped: u64,
    /// Events the sink acknowledged.
    pub pushed: u64,
    /// Events lost to a failed push.
    pub failed: u64,
}

/// Rendered scrape output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsExposition {
    /// Value for the `Content-Type` header.
    pub content_type: &'static str,
    /// Exposition text.
    pub body: String,
}

/// Handle to the telemetry emitter. Cheap to clone.
#[derive(Clone)]
pub struct TelemetryEmitter {
    inner: Arc<Inner>,
}

struct Inner {
    delivery: Option<Arc<Delivery>>,
    counters: Arc<Counters>,
    context: PushContext,
    registry: Arc<MetricsRegistry>,
    debug_enabled: bool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(delivery) = &self.delivery {
            delivery.queue.close();
        }
    }
}

impl std::fmt::Debug for TelemetryEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryEmitter")
            .field("sink", &self.sink().map(SinkEndpoint::push_url))
            .field("context", &self.inner.context)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl TelemetryEmitter {
    /// Creates an emitter and, if a sink is configured, spawns its delivery
    /// worker on the current Tokio runtime.
    ///
    /// Log shipping is disabled (with a warning) when the HTTP client cannot
    /// be built or no runtime is available.
    #[must_use]
    pub fn new(settings: EmitterSettings, registry: Arc<MetricsRegistry>) -> Self {
        let counters = Arc::new(Counters::default());
        let mut worker_handle = None;

        let delivery = settings.sink.and_then(|endpoint| {
            let client = match LogSinkClient::new(endpoint) {
                Ok(client) => client,
                Err(e) => {
                    tracing::warn!(error = %e, "Log sink client unavailable, log shipping disabled");
                    return None;
                }
            };
            let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                tracing::warn!("No Tokio runtime, log shipping disabled");
                return None;
            };

            let delivery = Arc::new(Delivery {
                queue: EventQueue::new(settings.queue_capacity),
                client,
                context: settings.context.clone(),
                counters: counters.clone(),
                batch_size: settings.batch_size.max(1),
            });
            worker_handle = Some(runtime.spawn(worker::run(delivery.clone())));

            tracing::info!(
                url = %delivery.client.endpoint().push_url(),
                timeout_ms = u64::try_from(delivery.client.endpoint().timeout.as_millis()).unwrap_or(u64::MAX),
                "Log shipping enabled"
            );
            Some(delivery)
        });

        Self {
            inner: Arc::new(Inner {
                delivery,
                counters,
                context: settings.context,
                registry,
                debug_enabled: settings.debug_enabled,
                worker: Mutex::new(worker_handle),
            }),
        }
    }

    /// Creates an emitter that records metrics but discards log events.
    #[must_use]
    pub fn disabled(registry: Arc<MetricsRegistry>) -> Self {
        Self::new(EmitterSettings::default(), registry)
    }

    /// Returns true if log events are shipped to a sink.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.delivery.is_some()
    }

    /// The configured log sink, if any.
    #[must_use]
    pub fn sink(&self) -> Option<&SinkEndpoint> {
        self.inner.delivery.as_ref().map(|d| d.client.endpoint())
    }

    /// Builds an event and queues it for delivery. Returns immediately.
    ///
    /// A blank message is a caller bug: it is reported through `tracing`
    /// at error level and the event is dropped.
    pub fn emit_log(&self, level: Level, message: impl Into<String>, attributes: Attributes) {
        match Event::new(level, message) {
            Ok(event) => self.emit(event.with_attributes(attributes)),
            Err(e) => tracing::error!(%level, error = %e, "Rejected telemetry event"),
        }
    }

    /// Queues an already built event for delivery. Returns immediately.
    ///
    /// Debug events are discarded unless debug shipping is enabled.
    pub fn emit(&self, event: Event) {
        if !self.ships(event.level()) {
            return;
        }
        let Some(delivery) = &self.inner.delivery else {
            return;
        };

        let counters = &self.inner.counters;
        match delivery.queue.offer(event) {
            Offer::Accepted => Counters::add(&counters.enqueued, 1),
            Offer::EvictedOldest => {
                Counters::add(&counters.enqueued, 1);
                Counters::add(&counters.dropped, 1);
            }
            Offer::Closed => Counters::add(&counters.dropped, 1),
        }
    }

    /// Pushes one event directly and waits for the single attempt to finish.
    ///
    /// The wait is bounded by the sink timeout. The outcome is only visible
    /// in [`TelemetryEmitter::stats`]. After [`TelemetryEmitter::shutdown`]
    /// the event is counted as dropped and nothing is sent.
    pub async fn send_now(&self, event: Event) {
        if !self.ships(event.level()) {
            return;
        }
        let Some(delivery) = &self.inner.delivery else {
            return;
        };
        if delivery.queue.is_closed() {
            Counters::add(&self.inner.counters.dropped, 1);
            return;
        }
        delivery.deliver(std::slice::from_ref(&event)).await;
    }

    fn ships(&self, level: Level) -> bool {
        level != Level::Debug || self.inner.debug_enabled
    }

    /// Emits an error-level event describing a failure the caller is about
    /// to propagate. The error itself is left untouched.
    pub fn record_failure(&self, message: &str, error: &impl Display, mut attributes: Attributes) {
        attributes.insert(
            "error".to_string(),
            AttributeValue::String(error.to_string()),
        );
        self.emit_log(Level::Error, message, attributes);
    }

    /// Applies a metric sample to the in-process registry.
    pub fn emit_metric(&self, sample: &MetricSample) {
        self.inner.registry.record(sample);
    }

    /// Renders the registry for a scraper.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be encoded.
    pub fn expose_metrics(&self) -> Result<MetricsExposition, RegistryError> {
        Ok(MetricsExposition {
            content_type: CONTENT_TYPE,
            body: self.inner.registry.render()?,
        })
    }

    /// The metrics registry backing [`TelemetryEmitter::emit_metric`].
    #[must_use]
    pub fn registry(&self) -> &MetricsRegistry {
        &self.inner.registry
    }

    /// Current delivery counters.
    #[must_use]
    pub fn stats(&self) -> DeliveryStats {
        let c = &self.inner.counters;
        DeliveryStats {
            enqueued: c.enqueued.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
            pushed: c.pushed.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
        }
    }

    /// Stops accepting events, lets the worker flush what is queued, and
    /// waits for it to finish.
    ///
    /// The wait is bounded by twice the sink timeout; a worker still busy
    /// after that is aborted and its remaining events are lost.
    pub async fn shutdown(&self) {
        let Some(delivery) = &self.inner.delivery else {
            return;
        };
        delivery.queue.close();

        let handle = self
            .inner
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            return;
        };

        let grace = delivery.client.endpoint().timeout.saturating_mul(2);
        let abort = handle.abort_handle();
        if tokio::time::timeout(grace, handle).await.is_err() {
            abort.abort();
            tracing::warn!(
                pending = delivery.queue.len(),
                grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX),
                "Log delivery did not finish before shutdown deadline"
            );
        }
    }
}

/// Helper for converting a duration into the `duration` attribute (seconds).
#[must_use]
pub fn duration_attribute(elapsed: Duration) -> AttributeValue {
    AttributeValue::Float(elapsed.as_secs_f64())
}
