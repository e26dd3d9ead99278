//! # Persisting bus decorator.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::MessageStore;
use crate::core::{MessageBus, Subscription, SubscriptionId};
use crate::error::BusError;
use crate::handlers::HandlerRef;
use crate::message::{MessageRef, Payload};
use crate::middleware::Middleware;

/// Bus decorator that persists every published message before publishing it.
///
/// ```
/// use tokio_util::sync::CancellationToken;
/// use topicbus::store::{InMemoryStore, MessageStore, PersistentBus};
/// use topicbus::{Bus, BusConfig, MessageBus};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), topicbus::BusError> {
/// let bus = PersistentBus::new(Bus::<String>::new(BusConfig::default()), InMemoryStore::new(0));
/// bus.publish(&CancellationToken::new(), "audit.login", "alice".into()).await?;
/// assert_eq!(bus.store().load().await?.len(), 1);
/// bus.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct PersistentBus<B, S> {
    bus: B,
    store: S,
}

impl<B, S> PersistentBus<B, S> {
    /// Wraps `bus`, persisting into `store`.
    pub fn new(bus: B, store: S) -> Self {
        Self { bus, store }
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The wrapped bus.
    pub fn inner(&self) -> &B {
        &self.bus
    }

    /// Republishes every stored message (asynchronously, without storing it
    /// again), stopping at the first error.
    pub async fn replay<P>(&self, ctx: &CancellationToken) -> Result<usize, BusError>
    where
        P: Payload,
        B: MessageBus<P>,
        S: MessageStore<P>,
    {
        let messages = self.store.load().await?;
        let count = messages.len();
        for msg in messages {
            self.bus.publish_message(ctx, msg).await?;
        }
        debug!(count, "replayed stored messages");
        Ok(count)
    }
}

#[async_trait]
impl<P, B, S> MessageBus<P> for PersistentBus<B, S>
where
    P: Payload,
    B: MessageBus<P>,
    S: MessageStore<P>,
{
    async fn publish_message(&self, ctx: &CancellationToken, msg: MessageRef<P>) -> Result<(), BusError> {
        self.store.store(&msg).await?;
        self.bus.publish_message(ctx, msg).await
    }

    async fn publish_message_sync(&self, ctx: &CancellationToken, msg: MessageRef<P>) -> Result<(), BusError> {
        self.store.store(&msg).await?;
        self.bus.publish_message_sync(ctx, msg).await
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
        let stored = self.store.close().await;
        let closed = self.bus.close().await;
        stored?;
        closed
    }
}
