//! # Messages carried by the bus.
//!
//! - [`Message`] - topic-addressed unit with an opaque payload and mutable metadata
//! - [`MessageRef`] - shared handle (`Arc<Message<P>>`) passed to handlers
//! - [`Priority`] - carried on every message, never used for ordering
//! - [`Payload`] - bound satisfied by any `Send + Sync + 'static` type

mod message;
mod priority;

pub use message::{Message, MessageId, MessageRef, Metadata, Payload};
pub use priority::Priority;
