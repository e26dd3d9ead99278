//! # Auditing bus decorator.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{HistoryEntry, HistoryEvent, MessageHistory};
use crate::core::{MessageBus, Subscription, SubscriptionId};
use crate::error::BusError;
use crate::handlers::HandlerRef;
use crate::message::{MessageRef, Payload};
use crate::middleware::Middleware;

/// Bus decorator recording every publish in a [`MessageHistory`].
///
/// `Published` is recorded before the inner publish; `PublishFailed` is added
/// when it returns an error.
pub struct AuditableBus<B, P: Payload> {
    bus: B,
    history: Arc<MessageHistory<P>>,
}

impl<B, P: Payload> AuditableBus<B, P> {
    /// Wraps `bus`, recording into `history`.
    pub fn new(bus: B, history: Arc<MessageHistory<P>>) -> Self {
        Self { bus, history }
    }

    /// The audit history.
    pub fn history(&self) -> &Arc<MessageHistory<P>> {
        &self.history
    }

    /// The wrapped bus.
    pub fn inner(&self) -> &B {
        &self.bus
    }

    fn audited(&self, msg: &MessageRef<P>, res: Result<(), BusError>) -> Result<(), BusError> {
        if let Err(e) = &res {
            self.history
                .record(HistoryEntry::new(Arc::clone(msg), HistoryEvent::PublishFailed).with_error(e));
        }
        res
    }
}

#[async_trait]
impl<P, B> MessageBus<P> for AuditableBus<B, P>
where
    P: Payload,
    B: MessageBus<P>,
{
    async fn publish_message(&self, ctx: &CancellationToken, msg: MessageRef<P>) -> Result<(), BusError> {
        self.history
            .record(HistoryEntry::new(Arc::clone(&msg), HistoryEvent::Published));
        let res = self.bus.publish_message(ctx, Arc::clone(&msg)).await;
        self.audited(&msg, res)
    }

    async fn publish_message_sync(&self, ctx: &CancellationToken, msg: MessageRef<P>) -> Result<(), BusError> {
        self.history
            .record(HistoryEntry::new(Arc::clone(&msg), HistoryEvent::Published));
        let res = self.bus.publish_message_sync(ctx, Arc::clone(&msg)).await;
        self.audited(&msg, res)
    }

    fn subscribe(
        &self,
        pattern: &str,
        handler: impl Into<Option<HandlerRef<P>>> + Send,
    ) -> Result<Subscription<P>, BusError> {
        self.bus.subscribe(pattern, handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> Result<(), BusError> {
        self.bus.unsubscribe(id)
    }

    fn use_middleware(&self, mw: Middleware<P>) {
        self.bus.use_middleware(mw);
    }

    async fn close(&self) -> Result<(), BusError> {
        self.bus.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BusConfig;
    use crate::core::Bus;
    use crate::error::HandlerError;
    use crate::handlers::HandlerFn;
    use crate::history::history_middleware;

    #[tokio::test]
    async fn records_publish_delivery_and_failures() {
        let history = Arc::new(MessageHistory::<String>::new(0));
        let bus = AuditableBus::new(Bus::<String>::new(BusConfig::default()), Arc::clone(&history));
        bus.use_middleware(history_middleware(Arc::clone(&history)));
        bus.subscribe(
            "jobs.*",
            HandlerFn::arc(|_ctx: CancellationToken, msg: MessageRef<String>| async move {
                if msg.payload() == "bad" {
                    return Err(HandlerError::fail("rejected"));
                }
                Ok(())
            }),
        )
        .unwrap();

        let ctx = CancellationToken::new();
        bus.publish_sync(&ctx, "jobs.run", "good".into()).await.unwrap();
        assert!(bus.publish_sync(&ctx, "jobs.run", "bad".into()).await.is_err());

        assert_eq!(history.by_event(HistoryEvent::Published).len(), 2);
        assert_eq!(history.by_event(HistoryEvent::Delivered).len(), 2);
        assert_eq!(history.by_event(HistoryEvent::Failed).len(), 1);
        assert_eq!(history.by_event(HistoryEvent::PublishFailed).len(), 1);

        bus.close().await.unwrap();
        let err = bus.publish(&ctx, "jobs.run", "late".into()).await.unwrap_err();
        assert!(matches!(err, BusError::Closed));
        let failed = history.by_event(HistoryEvent::PublishFailed);
        assert_eq!(failed.len(), 2);
        assert_eq!(failed[1].error.as_deref(), Some("bus is closed"));
        assert_eq!(history.by_topic("jobs.run").len(), 8);
    }
}
