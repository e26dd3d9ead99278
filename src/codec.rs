//! # Message codecs.
//!
//! A [`Codec`] turns serde values into bytes and back. [`StoredMessage`] is the
//! serde form of a whole [`Message`], used by file-backed stores.
//!
//! ```
//! use topicbus::codec::{Codec, JsonCodec, StoredMessage};
//! use topicbus::Message;
//!
//! let msg = Message::new("orders.created", 7_u32);
//! msg.metadata().insert("tenant", "eu-1");
//!
//! let codec = JsonCodec::default();
//! let bytes = codec.encode(&StoredMessage::from_message(&msg)).unwrap();
//! let back: Message<u32> = codec.decode::<StoredMessage<u32>>(&bytes).unwrap().into();
//! assert_eq!(back.id(), msg.id());
//! assert_eq!(back.metadata().get("tenant"), Some(serde_json::json!("eu-1")));
//! ```

use std::collections::HashMap;
use std::time::SystemTime;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;
use crate::message::{Message, MessageId, Priority};

/// Byte encoding for serde values.
pub trait Codec: Send + Sync + 'static {
    /// Encodes `value`.
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, StoreError>;

    /// Decodes a value from `bytes`.
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, StoreError>;
}

/// JSON codec backed by `serde_json`.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec {
    pretty: bool,
}

impl JsonCodec {
    /// Codec producing indented JSON.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl Codec for JsonCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, StoreError> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(value)?
        } else {
            serde_json::to_vec(value)?
        };
        Ok(bytes)
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, StoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Serializable snapshot of a [`Message`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage<P> {
    pub id: MessageId,
    pub topic: String,
    pub payload: P,
    /// Metadata as it was when the snapshot was taken.
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    pub timestamp: SystemTime,
    #[serde(default)]
    pub priority: Priority,
}

impl<P: Clone> StoredMessage<P> {
    /// Snapshots `msg`, including its current metadata.
    pub fn from_message(msg: &Message<P>) -> Self {
        Self {
            id: msg.id(),
            topic: msg.topic().to_owned(),
            payload: msg.payload().clone(),
            metadata: msg.metadata().snapshot(),
            timestamp: msg.timestamp(),
            priority: msg.priority(),
        }
    }
}

impl<P> From<StoredMessage<P>> for Message<P> {
    fn from(s: StoredMessage<P>) -> Self {
        Message::from_parts(s.id, s.topic, s.payload, s.metadata, s.timestamp, s.priority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Order {
        sku: String,
        qty: u32,
    }

    #[test]
    fn stored_message_keeps_every_field() {
        let msg = Message::with_priority(
            "orders.created",
            Order {
                sku: "A-1".into(),
                qty: 2,
            },
            Priority::High,
        );
        msg.metadata().insert("retry", 1);

        let codec = JsonCodec::pretty();
        let bytes = codec.encode(&StoredMessage::from_message(&msg)).unwrap();
        let stored: StoredMessage<Order> = codec.decode(&bytes).unwrap();
        let back = Message::from(stored);

        assert_eq!(back.id(), msg.id());
        assert_eq!(back.topic(), "orders.created");
        assert_eq!(back.timestamp(), msg.timestamp());
        assert_eq!(back.priority(), Priority::High);
        assert_eq!(back.metadata().get("retry"), Some(Value::from(1)));
        assert_eq!(back.payload(), msg.payload());
    }

    #[test]
    fn missing_optional_fields_default() {
        let id = MessageId::new();
        let raw = serde_json::json!({
            "id": id,
            "topic": "t",
            "payload": 5,
            "timestamp": { "secs_since_epoch": 10, "nanos_since_epoch": 0 },
        });
        let stored: StoredMessage<i32> = JsonCodec::default()
            .decode(&serde_json::to_vec(&raw).unwrap())
            .unwrap();
        assert_eq!(stored.priority, Priority::Normal);
        assert!(stored.metadata.is_empty());
    }

    #[test]
    fn garbage_is_a_codec_error() {
        let err = JsonCodec::default().decode::<StoredMessage<i32>>(b"not json").unwrap_err();
        assert_eq!(err.as_label(), "store_codec");
    }
}
