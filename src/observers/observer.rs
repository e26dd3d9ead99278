//! # Observer contract.
//!
//! Every hook has a no-op default, so an implementation only overrides what it
//! cares about.
//!
//! ## Example
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use topicbus::observers::Observer;
//! use topicbus::MessageRef;
//!
//! #[derive(Default)]
//! struct Published(AtomicUsize);
//!
//! impl Observer<String> for Published {
//!     fn on_publish(&self, _topic: &str, _msg: &MessageRef<String>) {
//!         self.0.fetch_add(1, Ordering::Relaxed);
//!     }
//! }
//! ```

use std::sync::Arc;

use crate::error::HandlerError;
use crate::message::{MessageRef, Payload};

/// Shared observer handle.
pub type ObserverRef<P> = Arc<dyn Observer<P>>;

/// Synchronous hooks fired by the bus.
///
/// Hooks run on the thread that triggered them (a publisher, a worker, or the
/// closer), so they should be quick and must not block.
pub trait Observer<P: Payload>: Send + Sync + 'static {
    /// A message was accepted by a publish call.
    fn on_publish(&self, _topic: &str, _msg: &MessageRef<P>) {}

    /// A subscription was registered.
    fn on_subscribe(&self, _pattern: &str) {}

    /// A subscription was removed.
    fn on_unsubscribe(&self, _pattern: &str) {}

    /// A dispatch attempt with at least one matching handler finished.
    fn on_message_processed(&self, _msg: &MessageRef<P>, _result: Result<(), &HandlerError>) {}

    /// The bus finished closing.
    fn on_close(&self) {}

    /// Name used in diagnostics.
    fn name(&self) -> &'static str {
        "observer"
    }
}
