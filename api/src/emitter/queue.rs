//! Bounded event queue with drop-oldest overflow.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

use lookout_shared::models::Event;

/// Result of offering an event to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Offer {
    /// The event was queued.
    Accepted,
    /// The event was queued after evicting the oldest one.
    EvictedOldest,
    /// The queue is closed; the event was discarded.
    Closed,
}

pub(crate) struct EventQueue {
    events: Mutex<VecDeque<Event>>,
    capacity: usize,
    closed: AtomicBool,
    notify: Notify,
}

impl EventQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            closed: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    // No operation leaves the deque partially updated; poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, VecDeque<Event>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn offer(&self, event: Event) -> Offer {
        if self.is_closed() {
            return Offer::Closed;
        }

        let outcome = {
            let mut events = self.lock();
            let evicted = if events.len() >= self.capacity {
                events.pop_front();
                true
            } else {
                false
            };
            events.push_back(event);
            if evicted {
                Offer::EvictedOldest
            } else {
                Offer::Accepted
            }
        };

        self.notify.notify_one();
        outcome
    }

    /// Removes up to `max` events from the front of the queue.
    pub(crate) fn drain(&self, max: usize) -> Vec<Event> {
        let mut events = self.lock();
        let n = events.len().min(max.max(1));
        events.drain(..n).collect()
    }

    /// Waits until an event is offered or the queue is closed.
    pub(crate) async fn wait(&self) {
        self.notify.notified().await;
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }
}
