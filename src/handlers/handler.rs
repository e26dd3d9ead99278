//! # Handler abstraction.
//!
//! A [`Handler`] consumes messages delivered by the bus. The same shape is used
//! for subscription handlers, the dead-letter handler and every layer a
//! middleware wraps around them.
//!
//! Handlers receive a [`CancellationToken`]. On the synchronous path it is the
//! caller's token; on the async path it is a fresh token per dispatch. Handlers
//! that do long work should honor it.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;
use crate::message::{MessageRef, Payload};

/// # Asynchronous message handler.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use topicbus::{Handler, HandlerError, MessageRef};
///
/// struct Audit;
///
/// #[async_trait]
/// impl Handler<String> for Audit {
///     async fn handle(&self, ctx: CancellationToken, msg: MessageRef<String>) -> Result<(), HandlerError> {
///         if ctx.is_cancelled() {
///             return Err(HandlerError::Canceled);
///         }
///         println!("{} -> {}", msg.topic(), msg.payload());
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Handler<P: Payload>: Send + Sync + 'static {
    /// Processes one message.
    ///
    /// Returning an error on the async path schedules a retry (or dead-lettering);
    /// on the sync path the error is returned to the publisher as-is.
    async fn handle(&self, ctx: CancellationToken, msg: MessageRef<P>) -> Result<(), HandlerError>;
}

/// Shared handle to a handler.
pub type HandlerRef<P> = Arc<dyn Handler<P>>;
