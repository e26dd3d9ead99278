//! # Counting observer.
//!
//! [`StatsObserver`] keeps lock-free counters of bus activity. Clones share the
//! same counters, so one clone can be registered with the bus and another kept
//! for reading.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::Observer;
use crate::error::HandlerError;
use crate::message::{MessageRef, Payload};

#[derive(Debug, Default)]
struct Counters {
    published: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
    subscribed: AtomicU64,
    unsubscribed: AtomicU64,
}

/// Point-in-time copy of [`StatsObserver`] counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Messages accepted by publish calls.
    pub published: u64,
    /// Dispatch attempts that succeeded.
    pub processed: u64,
    /// Dispatch attempts that failed (each retry counts).
    pub failed: u64,
    /// Successful subscribe calls.
    pub subscribed: u64,
    /// Successful unsubscribe calls.
    pub unsubscribed: u64,
}

/// Observer counting publishes, dispatch outcomes and subscription changes.
#[derive(Clone, Debug, Default)]
pub struct StatsObserver {
    counters: Arc<Counters>,
}

impl StatsObserver {
    /// Creates a zeroed observer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        let c = &self.counters;
        StatsSnapshot {
            published: c.published.load(Ordering::Relaxed),
            processed: c.processed.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            subscribed: c.subscribed.load(Ordering::Relaxed),
            unsubscribed: c.unsubscribed.load(Ordering::Relaxed),
        }
    }
}

impl<P: Payload> Observer<P> for StatsObserver {
    fn on_publish(&self, _topic: &str, _msg: &MessageRef<P>) {
        self.counters.published.fetch_add(1, Ordering::Relaxed);
    }

    fn on_subscribe(&self, _pattern: &str) {
        self.counters.subscribed.fetch_add(1, Ordering::Relaxed);
    }

    fn on_unsubscribe(&self, _pattern: &str) {
        self.counters.unsubscribed.fetch_add(1, Ordering::Relaxed);
    }

    fn on_message_processed(&self, _msg: &MessageRef<P>, result: Result<(), &HandlerError>) {
        let counter = match result {
            Ok(()) => &self.counters.processed,
            Err(_) => &self.counters.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn name(&self) -> &'static str {
        "stats"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[test]
    fn clones_share_counters() {
        let stats = StatsObserver::new();
        let reader = stats.clone();
        let obs: &dyn Observer<u32> = &stats;

        let msg = Arc::new(Message::new("t", 1_u32));
        obs.on_publish("t", &msg);
        obs.on_subscribe("t");
        obs.on_message_processed(&msg, Ok(()));
        obs.on_message_processed(&msg, Err(&HandlerError::fail("x")));
        obs.on_unsubscribe("t");

        assert_eq!(
            reader.snapshot(),
            StatsSnapshot {
                published: 1,
                processed: 1,
                failed: 1,
                subscribed: 1,
                unsubscribed: 1,
            }
        );
    }
}
