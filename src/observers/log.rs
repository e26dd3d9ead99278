use tracing::{debug, info, warn};

use super::Observer;
use crate::error::HandlerError;
use crate::message::{MessageRef, Payload};

/// Observer that writes every hook as a structured `tracing` event.
///
/// Enabled via the `logging` feature. Useful for demos and debugging.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogObserver;

impl<P: Payload> Observer<P> for LogObserver {
    fn on_publish(&self, topic: &str, msg: &MessageRef<P>) {
        debug!(topic, id = %msg.id(), priority = msg.priority().as_label(), "published");
    }

    fn on_subscribe(&self, pattern: &str) {
        debug!(pattern, "subscribed");
    }

    fn on_unsubscribe(&self, pattern: &str) {
        debug!(pattern, "unsubscribed");
    }

    fn on_message_processed(&self, msg: &MessageRef<P>, result: Result<(), &HandlerError>) {
        match result {
            Ok(()) => debug!(topic = msg.topic(), id = %msg.id(), "processed"),
            Err(e) => warn!(topic = msg.topic(), id = %msg.id(), error = %e, "processing failed"),
        }
    }

    fn on_close(&self) {
        info!("bus closed");
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
