//! Log event data model.
//!
//! Defines the immutable `Event` record handed to the telemetry emitter and
//! the scalar attribute values it carries.

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::clock;

/// Log severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Debug information, only shipped when debug logging is enabled.
    Debug,
    /// Informational messages.
    Info,
    /// Warning conditions.
    Warn,
    /// Error conditions.
    Error,
}

impl Level {
    /// Returns the lowercase label used on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unrecognized level name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unrecognized log level: '{0}' (expected debug, info, warn or error)")]
pub struct LevelParseError(pub String);

impl FromStr for Level {
    type Err = LevelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(LevelParseError(s.to_string())),
        }
    }
}

/// A scalar attribute value attached to an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Absent value (e.g. an unknown client address).
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Free-form text.
    String(String),
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&String> for AttributeValue {
    fn from(value: &String) -> Self {
        Self::String(value.clone())
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u16> for AttributeValue {
    fn from(value: u16) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for AttributeValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u64> for AttributeValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or(Self::Float(value as f64), Self::Int)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Insertion-ordered attribute mapping.
pub type Attributes = IndexMap<String, AttributeValue>;

/// Builds an [`Attributes`] map from `key => value` pairs, preserving order.
///
/// ```
/// use lookout_shared::attributes;
/// use lookout_shared::models::AttributeValue;
///
/// let attrs = attributes! { "method" => "GET", "status_code" => 200 };
/// assert_eq!(attrs["status_code"], AttributeValue::Int(200));
/// ```
#[macro_export]
macro_rules! attributes {
    () => {
        $crate::models::Attributes::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut attrs = $crate::models::Attributes::new();
        $(
            attrs.insert(
                ::std::string::String::from($key),
                $crate::models::AttributeValue::from($value),
            );
        )+
        attrs
    }};
}

/// A single structured log record.
///
/// Events are stamped from the process-wide monotonic clock at
/// construction, so events built in call order on one thread carry
/// non-decreasing timestamps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    level: Level,
    message: String,
    timestamp: DateTime<Utc>,
    attributes: Attributes,
}

/// Errors that can occur while constructing an event.
#[derive(Debug, Error)]
pub enum EventError {
    /// The message is empty or whitespace only.
    #[error("Event message cannot be empty")]
    EmptyMessage,
}

impl Event {
    /// Creates a new event stamped with the current monotonic time.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::EmptyMessage`] if the message is blank.
    ///
    /// # Example
    ///
    /// ```
    /// use lookout_shared::models::{Event, Level};
    ///
    /// let event = Event::new(Level::Warn, "Route not found").unwrap();
    /// assert_eq!(event.level(), Level::Warn);
    /// assert!(Event::new(Level::Info, "  ").is_err());
    /// ```
    pub fn new(level: Level, message: impl Into<String>) -> Result<Self, EventError> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(EventError::EmptyMessage);
        }

        Ok(Self {
            level,
            message,
            timestamp: clock::now(),
            attributes: Attributes::new(),
        })
    }

    /// Replaces the attributes of the event.
    #[must_use]
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Adds a single attribute, keeping insertion order.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Overrides the timestamp. Intended for replaying recorded events.
    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Severity level.
    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    /// Message text.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Time the event was created.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Attached attributes in insertion order.
    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Nanoseconds since the Unix epoch, the log sink's time axis.
    #[must_use]
    pub fn epoch_nanos(&self) -> i64 {
        self.timestamp.timestamp_nanos_opt().unwrap_or(i64::MAX)
    }

    /// ISO-8601 timestamp with millisecond precision, e.g. `2024-01-15T10:30:00.000Z`.
    #[must_use]
    pub fn iso_timestamp(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}
