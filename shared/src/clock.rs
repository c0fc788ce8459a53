//! Monotonic wall-clock timestamps for log events.
//!
//! The log sink orders entries within a stream by their nanosecond
//! timestamp. A wall clock can step backwards (NTP adjustments), so events
//! are stamped from a clock that never returns a value lower than one it
//! has already handed out.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

static PROCESS_CLOCK: MonotonicClock = MonotonicClock::new();

/// Returns the current time from the process-wide monotonic clock.
#[must_use]
pub fn now() -> DateTime<Utc> {
    PROCESS_CLOCK.now()
}

/// A wall clock clamped to never go backwards.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last_nanos: AtomicI64,
}

impl MonotonicClock {
    /// Creates a clock that has not issued any timestamp yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_nanos: AtomicI64::new(i64::MIN),
        }
    }

    /// Returns `max(wall clock, last issued timestamp)`.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.observe(Utc::now())
    }

    /// Clamps an externally read wall-clock instant against the last issued value.
    pub fn observe(&self, wall: DateTime<Utc>) -> DateTime<Utc> {
        let wall_nanos = wall.timestamp_nanos_opt().unwrap_or(i64::MAX);
        let previous = self.last_nanos.fetch_max(wall_nanos, Ordering::AcqRel);
        DateTime::from_timestamp_nanos(wall_nanos.max(previous))
    }
}
