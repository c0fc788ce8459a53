//! Background log delivery.
//!
//! One worker task per emitter drains the queue in batches and makes a
//! single push attempt per batch. Failed batches are counted and discarded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lookout_shared::models::Event;
use lookout_shared::push::{PushContext, PushRequest};
use lookout_shared::sink::LogSinkClient;

use super::queue::EventQueue;

/// Delivery counters shared between the emitter handle and its worker.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) enqueued: AtomicU64,
    pub(crate) dropped: AtomicU64,
    pub(crate) pushed: AtomicU64,
    pub(crate) failed: AtomicU64,
}

impl Counters {
    pub(crate) fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }
}

/// Everything the worker needs to ship events.
pub(crate) struct Delivery {
    pub(crate) queue: EventQueue,
    pub(crate) client: LogSinkClient,
    pub(crate) context: PushContext,
    pub(crate) counters: Arc<Counters>,
    pub(crate) batch_size: usize,
}

impl Delivery {
    /// Pushes a batch once. Never fails from the caller's point of view.
    pub(crate) async fn deliver(&self, events: &[Event]) {
        if events.is_empty() {
            return;
        }

        let request = PushRequest::from_events(&self.context, events);
        match self.client.push(&request).await {
            Ok(()) => Counters::add(&self.counters.pushed, events.len()),
            Err(e) => {
                Counters::add(&self.counters.failed, events.len());
                tracing::debug!(
                    error = %e,
                    events = events.len(),
                    "Log push failed, events discarded"
                );
            }
        }
    }
}

/// Worker loop. Exits once the queue is closed and fully drained.
pub(crate) async fn run(delivery: Arc<Delivery>) {
    loop {
        let batch = delivery.queue.drain(delivery.batch_size);
        if batch.is_empty() {
            if delivery.queue.is_closed() {
                break;
            }
            delivery.queue.wait().await;
            continue;
        }

        delivery.deliver(&batch).await;
    }

    tracing::debug!("Log delivery worker stopped");
}
