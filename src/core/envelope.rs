use crate::message::{MessageRef, Payload, Priority};

/// Unit of queued work: a message plus its retry bookkeeping.
///
/// Owned by the queue, then by the worker that dequeued it. Only the dispatcher
/// touches `retries`.
#[derive(Debug)]
pub struct Envelope<P: Payload> {
    /// The message being delivered.
    pub message: MessageRef<P>,
    /// Failed attempts so far.
    pub retries: u32,
    /// Copied from the message; carried but not used for ordering.
    pub priority: Priority,
}

impl<P: Payload> Envelope<P> {
    /// Wraps a message with a zero retry count.
    pub fn new(message: MessageRef<P>) -> Self {
        let priority = message.priority();
        Self {
            message,
            retries: 0,
            priority,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use std::sync::Arc;

    #[test]
    fn new_envelope_copies_priority() {
        let msg = Arc::new(Message::with_priority("jobs", (), Priority::Urgent));
        let env = Envelope::new(msg);
        assert_eq!(env.priority, Priority::Urgent);
        assert_eq!(env.retries, 0);
    }
}
