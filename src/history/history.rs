use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;
use crate::handlers::{Handler, HandlerRef};
use crate::message::{MessageId, MessageRef, Payload};
use crate::middleware::Middleware;

/// Capacity used when a [`MessageHistory`] is created with `0`.
pub const DEFAULT_HISTORY_SIZE: usize = 10_000;

/// What happened to a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryEvent {
    /// Accepted by a publish call.
    Published,
    /// A publish call returned an error.
    PublishFailed,
    /// Handed to a handler.
    Delivered,
    /// A handler returned an error.
    Failed,
}

impl HistoryEvent {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            HistoryEvent::Published => "published",
            HistoryEvent::PublishFailed => "publish_failed",
            HistoryEvent::Delivered => "delivered",
            HistoryEvent::Failed => "failed",
        }
    }
}

/// One recorded event.
#[derive(Debug)]
pub struct HistoryEntry<P: Payload> {
    pub message: MessageRef<P>,
    pub event: HistoryEvent,
    pub at: SystemTime,
    /// Error text for `PublishFailed` and `Failed`.
    pub error: Option<String>,
}

impl<P: Payload> HistoryEntry<P> {
    /// Creates an entry stamped with the current time.
    pub fn new(message: MessageRef<P>, event: HistoryEvent) -> Self {
        Self {
            message,
            event,
            at: SystemTime::now(),
            error: None,
        }
    }

    /// Attaches error text.
    pub fn with_error(mut self, error: impl ToString) -> Self {
        self.error = Some(error.to_string());
        self
    }
}

impl<P: Payload> Clone for HistoryEntry<P> {
    fn clone(&self) -> Self {
        Self {
            message: Arc::clone(&self.message),
            event: self.event,
            at: self.at,
            error: self.error.clone(),
        }
    }
}

/// Bounded, thread-safe event log; the oldest entries are dropped first.
pub struct MessageHistory<P: Payload> {
    entries: RwLock<VecDeque<HistoryEntry<P>>>,
    max_size: usize,
}

impl<P: Payload> MessageHistory<P> {
    /// Creates a history holding at most `max_size` entries (`0` → [`DEFAULT_HISTORY_SIZE`]).
    pub fn new(max_size: usize) -> Self {
        let max_size = if max_size == 0 { DEFAULT_HISTORY_SIZE } else { max_size };
        Self {
            entries: RwLock::new(VecDeque::new()),
            max_size,
        }
    }

    /// Appends an entry, trimming the oldest if over capacity.
    pub fn record(&self, entry: HistoryEntry<P>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.push_back(entry);
        while entries.len() > self.max_size {
            entries.pop_front();
        }
    }

    fn select(&self, pred: impl Fn(&HistoryEntry<P>) -> bool) -> Vec<HistoryEntry<P>> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|e| pred(e))
            .cloned()
            .collect()
    }

    /// Every entry, oldest first.
    pub fn all(&self) -> Vec<HistoryEntry<P>> {
        self.select(|_| true)
    }

    /// Entries about one message.
    pub fn by_message_id(&self, id: MessageId) -> Vec<HistoryEntry<P>> {
        self.select(|e| e.message.id() == id)
    }

    /// Entries whose message was published on exactly `topic`.
    pub fn by_topic(&self, topic: &str) -> Vec<HistoryEntry<P>> {
        self.select(|e| e.message.topic() == topic)
    }

    /// Entries of one kind.
    pub fn by_event(&self, event: HistoryEvent) -> Vec<HistoryEntry<P>> {
        self.select(|e| e.event == event)
    }

    /// Entries recorded within `[start, end]`.
    pub fn in_time_range(&self, start: SystemTime, end: SystemTime) -> Vec<HistoryEntry<P>> {
        self.select(|e| e.at >= start && e.at <= end)
    }

    /// Number of entries.
    pub fn count(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries.write().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl<P: Payload> Default for MessageHistory<P> {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_SIZE)
    }
}

struct Recorded<P: Payload> {
    history: Arc<MessageHistory<P>>,
    inner: HandlerRef<P>,
}

#[async_trait]
impl<P: Payload> Handler<P> for Recorded<P> {
    async fn handle(&self, ctx: CancellationToken, msg: MessageRef<P>) -> Result<(), HandlerError> {
        self.history
            .record(HistoryEntry::new(Arc::clone(&msg), HistoryEvent::Delivered));

        let res = self.inner.handle(ctx, Arc::clone(&msg)).await;
        if let Err(e) = &res {
            self.history
                .record(HistoryEntry::new(msg, HistoryEvent::Failed).with_error(e));
        }
        res
    }
}

/// Creates middleware recording `Delivered` before each dispatch and `Failed`
/// when it returns an error.
pub fn history_middleware<P: Payload>(history: Arc<MessageHistory<P>>) -> Middleware<P> {
    Arc::new(move |inner: HandlerRef<P>| -> HandlerRef<P> {
        Arc::new(Recorded {
            history: Arc::clone(&history),
            inner,
        })
    })
}
