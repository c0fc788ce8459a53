//! Push envelope accepted by the log sink.
//!
//! The sink expects a batch of streams. Each stream is a label set plus an
//! ordered list of `[epoch_nanos_as_string, line]` pairs, where `line` is the
//! JSON-encoded event payload:
//!
//! ```json
//! {"streams": [{"stream": {"app": "api", "level": "info", "service": "shop"},
//!               "values": [["1705314600000000000", "{\"message\":\"GET /\",...}"]]}]}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::models::{Event, Level};

/// Payload keys owned by the emitter; attributes with these names are skipped.
const RESERVED_FIELDS: [&str; 5] = ["message", "timestamp", "level", "service", "environment"];

/// Static identity stamped on every pushed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushContext {
    /// Value of the `app` stream label.
    pub app: String,
    /// Value of the `service` stream label and payload field.
    pub service: String,
    /// Value of the `environment` payload field.
    pub environment: String,
}

impl PushContext {
    /// Creates a push context.
    #[must_use]
    pub fn new(
        app: impl Into<String>,
        service: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            app: app.into(),
            service: service.into(),
            environment: environment.into(),
        }
    }

    /// Label set identifying the stream for a given level.
    #[must_use]
    pub fn stream_labels(&self, level: Level) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("app".to_string(), self.app.clone()),
            ("level".to_string(), level.to_string()),
            ("service".to_string(), self.service.clone()),
        ])
    }

    /// Renders the JSON line for one event.
    ///
    /// Field order is `message`, `timestamp`, `level`, `service`,
    /// `environment`, followed by the event attributes in insertion order.
    #[must_use]
    pub fn render_line(&self, event: &Event) -> String {
        let mut line = Map::new();
        line.insert("message".into(), Value::String(event.message().to_string()));
        line.insert("timestamp".into(), Value::String(event.iso_timestamp()));
        line.insert("level".into(), Value::String(event.level().to_string()));
        line.insert("service".into(), Value::String(self.service.clone()));
        line.insert(
            "environment".into(),
            Value::String(self.environment.clone()),
        );

        for (key, value) in event.attributes() {
            if RESERVED_FIELDS.contains(&key.as_str()) {
                continue;
            }
            line.insert(
                key.clone(),
                serde_json::to_value(value).unwrap_or(Value::Null),
            );
        }

        Value::Object(line).to_string()
    }
}

/// One label-stream group in a push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogStream {
    /// Stream labels.
    pub stream: BTreeMap<String, String>,
    /// `(epoch nanos, JSON line)` pairs in emission order.
    pub values: Vec<(String, String)>,
}

/// The body of a push request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PushRequest {
    /// Streams in the batch.
    pub streams: Vec<LogStream>,
}

impl PushRequest {
    /// Builds a push from a batch of events.
    ///
    /// Events are grouped into one stream per level; within a stream they
    /// keep the order in which they were supplied.
    ///
    /// # Example
    ///
    /// ```
    /// use lookout_shared::models::{Event, Level};
    /// use lookout_shared::push::{PushContext, PushRequest};
    ///
    /// let ctx = PushContext::new("api", "shop", "production");
    /// let events = vec![
    ///     Event::new(Level::Info, "GET /").unwrap(),
    ///     Event::new(Level::Error, "boom").unwrap(),
    ///     Event::new(Level::Info, "Response 200").unwrap(),
    /// ];
    ///
    /// let push = PushRequest::from_events(&ctx, &events);
    /// assert_eq!(push.streams.len(), 2);
    /// assert_eq!(push.entry_count(), 3);
    /// ```
    #[must_use]
    pub fn from_events<'a>(
        context: &PushContext,
        events: impl IntoIterator<Item = &'a Event>,
    ) -> Self {
        let mut by_level: BTreeMap<Level, Vec<(String, String)>> = BTreeMap::new();
        for event in events {
            by_level.entry(event.level()).or_default().push((
                event.epoch_nanos().to_string(),
                context.render_line(event),
            ));
        }

        let streams = by_level
            .into_iter()
            .map(|(level, values)| LogStream {
                stream: context.stream_labels(level),
                values,
            })
            .collect();

        Self { streams }
    }

    /// Total number of log lines across all streams.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.streams.iter().map(|s| s.values.len()).sum()
    }

    /// Returns true if the push carries no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entry_count() == 0
    }
}
