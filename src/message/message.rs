//! # Message value.
//!
//! A [`Message`] is created once by a publish call and then shared (as
//! [`MessageRef`]) between the queue, handlers, stores and history. Everything
//! except its metadata is immutable after creation.
//!
//! ## Metadata
//! Metadata is an open `String -> serde_json::Value` map behind a lock, so
//! middleware and handlers can annotate a message they only hold by `Arc`.
//!
//! ```
//! use topicbus::Message;
//!
//! let msg = Message::new("orders.created", 42_u32);
//! msg.metadata().insert("tenant", "eu-1");
//! assert_eq!(msg.metadata().get("tenant"), Some(serde_json::json!("eu-1")));
//! assert_eq!(*msg.payload(), 42);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::Priority;

/// Bound for payload types. Blanket-implemented; the bus never inspects payloads.
pub trait Payload: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Payload for T {}

/// Shared handle to a message.
pub type MessageRef<P> = Arc<Message<P>>;

/// Unique message identifier (random UUID v4).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Generates a fresh id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Interior-mutable key/value annotations on a message.
#[derive(Debug, Default)]
pub struct Metadata {
    entries: RwLock<HashMap<String, Value>>,
}

impl Metadata {
    fn from_map(map: HashMap<String, Value>) -> Self {
        Self {
            entries: RwLock::new(map),
        }
    }

    /// Sets `key` to `value`, returning the previous value if any.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.into(), value.into())
    }

    /// Returns a copy of the value under `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    /// Returns true if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(key)
    }

    /// Removes `key`, returning its value.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// True if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Point-in-time copy of all entries.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// A topic-addressed message with an opaque payload.
#[derive(Debug)]
pub struct Message<P> {
    id: MessageId,
    topic: String,
    payload: P,
    metadata: Metadata,
    timestamp: SystemTime,
    priority: Priority,
}

impl<P> Message<P> {
    /// Creates a message with [`Priority::Normal`], a fresh id and the current time.
    pub fn new(topic: impl Into<String>, payload: P) -> Self {
        Self::with_priority(topic, payload, Priority::Normal)
    }

    /// Creates a message with an explicit priority.
    pub fn with_priority(topic: impl Into<String>, payload: P, priority: Priority) -> Self {
        Self {
            id: MessageId::new(),
            topic: topic.into(),
            payload,
            metadata: Metadata::default(),
            timestamp: SystemTime::now(),
            priority,
        }
    }

    /// Rebuilds a message from stored parts, keeping its identity and timestamp.
    pub fn from_parts(
        id: MessageId,
        topic: String,
        payload: P,
        metadata: HashMap<String, Value>,
        timestamp: SystemTime,
        priority: Priority,
    ) -> Self {
        Self {
            id,
            topic,
            payload,
            metadata: Metadata::from_map(metadata),
            timestamp,
            priority,
        }
    }

    /// Unique id.
    pub fn id(&self) -> MessageId {
        self.id
    }

    /// Topic the message was published on.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Caller-supplied payload.
    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// Mutable annotations.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Creation time.
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// Priority tag (informational only).
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Consumes the message, returning its payload.
    pub fn into_payload(self) -> P {
        self.payload
    }
}
