//! # Bus facade.
//!
//! [`Bus`] is the concrete in-process bus; [`MessageBus`] is the capability it
//! exposes. Decorators (persistence, audit, batching) are written against the
//! trait, so they compose with each other and with the plain bus.
//!
//! ## Lifecycle
//! ```text
//! BusBuilder::build()
//!   └─► workers spawned ─► publish / subscribe / use_middleware ...
//!                              │
//!                           close()
//!                              ├─ closed flag set (later calls → Closed)
//!                              ├─ queue closed, backlog drained
//!                              ├─ workers joined
//!                              ├─ registry cleared
//!                              └─ on_close()
//! ```
//!
//! ## Example
//! ```
//! use tokio_util::sync::CancellationToken;
//! use topicbus::{Bus, BusConfig, HandlerError, HandlerFn, MessageBus, MessageRef};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), topicbus::BusError> {
//! let bus: Bus<String> = Bus::new(BusConfig::default());
//! let sub = bus.subscribe(
//!     "orders.*",
//!     HandlerFn::arc(|_ctx: CancellationToken, msg: MessageRef<String>| async move {
//!         println!("{} -> {}", msg.topic(), msg.payload());
//!         Ok::<_, HandlerError>(())
//!     }),
//! )?;
//!
//! let ctx = CancellationToken::new();
//! bus.publish_sync(&ctx, "orders.created", "A".to_string()).await?;
//! sub.unsubscribe()?;
//! bus.close().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{worker, BusBuilder, Dispatcher, Subscription, SubscriptionId};
use crate::config::BusConfig;
use crate::error::BusError;
use crate::handlers::HandlerRef;
use crate::message::{Message, MessageRef, Payload, Priority};
use crate::middleware::{Middleware, MiddlewareChain};
use crate::observers::ObserverSet;

/// Capability shared by the bus and every bus decorator.
#[async_trait]
pub trait MessageBus<P: Payload>: Send + Sync {
    /// Enqueues an already built message for asynchronous dispatch.
    ///
    /// The same `Arc` is what handlers receive.
    ///
    /// # Errors
    /// - [`BusError::Closed`] if the bus is closed;
    /// - [`BusError::Cancelled`] if `ctx` fires while waiting for queue space.
    async fn publish_message(&self, ctx: &CancellationToken, msg: MessageRef<P>) -> Result<(), BusError>;

    /// Dispatches an already built message on the calling task.
    ///
    /// # Errors
    /// - [`BusError::Closed`] if the bus is closed;
    /// - [`BusError::Handler`] carrying the last handler error.
    async fn publish_message_sync(&self, ctx: &CancellationToken, msg: MessageRef<P>) -> Result<(), BusError>;

    /// Registers `handler` for topics matching `pattern`.
    ///
    /// # Errors
    /// [`BusError::Closed`], [`BusError::InvalidPattern`] or [`BusError::InvalidHandler`].
    fn subscribe(
        &self,
        pattern: &str,
        handler: impl Into<Option<HandlerRef<P>>> + Send,
    ) -> Result<Subscription<P>, BusError>;

    /// Removes a subscription by id.
    ///
    /// # Errors
    /// [`BusError::NotFound`] if `id` is not registered.
    fn unsubscribe(&self, id: SubscriptionId) -> Result<(), BusError>;

    /// Appends a middleware layer. Applies to every later dispatch.
    fn use_middleware(&self, mw: Middleware<P>);

    /// Closes the bus, draining in-flight work.
    ///
    /// # Errors
    /// [`BusError::AlreadyClosed`] on every call after the first.
    async fn close(&self) -> Result<(), BusError>;

    /// Publishes `payload` on `topic` asynchronously with [`Priority::Normal`].
    async fn publish(&self, ctx: &CancellationToken, topic: &str, payload: P) -> Result<(), BusError> {
        self.publish_message(ctx, Arc::new(Message::new(topic, payload))).await
    }

    /// Publishes `payload` on `topic` and waits for every matching handler.
    async fn publish_sync(&self, ctx: &CancellationToken, topic: &str, payload: P) -> Result<(), BusError> {
        self.publish_message_sync(ctx, Arc::new(Message::new(topic, payload)))
            .await
    }

    /// Like [`publish`](Self::publish), but fails fast if `ctx` is already
    /// cancelled and tags the message with `priority`.
    async fn publish_with_priority(
        &self,
        ctx: &CancellationToken,
        topic: &str,
        payload: P,
        priority: Priority,
    ) -> Result<(), BusError> {
        if ctx.is_cancelled() {
            return Err(BusError::Cancelled);
        }
        self.publish_message(ctx, Arc::new(Message::with_priority(topic, payload, priority)))
            .await
    }
}

#[async_trait]
impl<P: Payload, B: MessageBus<P>> MessageBus<P> for Arc<B> {
    async fn publish_message(&self, ctx: &CancellationToken, msg: MessageRef<P>) -> Result<(), BusError> {
        B::publish_message(self, ctx, msg).await
    }

    async fn publish_message_sync(&self, ctx: &CancellationToken, msg: MessageRef<P>) -> Result<(), BusError> {
        B::publish_message_sync(self, ctx, msg).await
    }

    fn subscribe(
        &self,
        pattern: &str,
        handler: impl Into<Option<HandlerRef<P>>> + Send,
    ) -> Result<Subscription<P>, BusError> {
        B::subscribe(self, pattern, handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> Result<(), BusError> {
        B::unsubscribe(self, id)
    }

    fn use_middleware(&self, mw: Middleware<P>) {
        B::use_middleware(self, mw)
    }

    async fn close(&self) -> Result<(), BusError> {
        B::close(self).await
    }
}

/// In-process publish/subscribe bus with a fixed worker pool.
pub struct Bus<P: Payload> {
    dispatcher: Arc<Dispatcher<P>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl<P: Payload> Bus<P> {
    /// Creates a bus with no dead-letter handler, observers or middleware.
    ///
    /// Must be called from within a tokio runtime. Use [`BusBuilder`] for the
    /// optional parts.
    pub fn new(cfg: BusConfig) -> Self {
        BusBuilder::new(cfg).build()
    }

    /// Returns a builder.
    pub fn builder(cfg: BusConfig) -> BusBuilder<P> {
        BusBuilder::new(cfg)
    }

    pub(crate) fn from_parts(
        cfg: BusConfig,
        dead_letter: Option<HandlerRef<P>>,
        observers: ObserverSet<P>,
        middleware: MiddlewareChain<P>,
    ) -> Self {
        let count = cfg.workers_clamped();
        let dispatcher = Arc::new(Dispatcher::new(cfg, dead_letter, observers, middleware));
        let workers = worker::spawn_pool(count, &dispatcher);
        Self {
            dispatcher,
            workers: Mutex::new(workers),
        }
    }

    /// Configuration the bus was built with.
    pub fn config(&self) -> &BusConfig {
        self.dispatcher.config()
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.dispatcher.registry().count()
    }

    /// True once [`close`](MessageBus::close) has started.
    pub fn is_closed(&self) -> bool {
        self.dispatcher.is_closed()
    }
}

#[async_trait]
impl<P: Payload> MessageBus<P> for Bus<P> {
    async fn publish_message(&self, ctx: &CancellationToken, msg: MessageRef<P>) -> Result<(), BusError> {
        self.dispatcher.publish(ctx, msg).await
    }

    async fn publish_message_sync(&self, ctx: &CancellationToken, msg: MessageRef<P>) -> Result<(), BusError> {
        self.dispatcher.publish_sync(ctx, msg).await
    }

    fn subscribe(
        &self,
        pattern: &str,
        handler: impl Into<Option<HandlerRef<P>>> + Send,
    ) -> Result<Subscription<P>, BusError> {
        self.dispatcher.subscribe(pattern, handler.into())
    }

    fn unsubscribe(&self, id: SubscriptionId) -> Result<(), BusError> {
        self.dispatcher.unsubscribe(id)
    }

    fn use_middleware(&self, mw: Middleware<P>) {
        self.dispatcher.use_middleware(mw);
    }

    async fn close(&self) -> Result<(), BusError> {
        self.dispatcher.mark_closed()?;
        self.dispatcher.queue().close();

        let workers = std::mem::take(&mut *self.workers.lock().unwrap_or_else(|e| e.into_inner()));
        for handle in workers {
            if let Err(e) = handle.await {
                warn!(error = %e, "bus worker ended abnormally");
            }
        }

        self.dispatcher.registry().clear();
        self.dispatcher.observers().close();
        info!("bus closed");
        Ok(())
    }
}

impl<P: Payload> Drop for Bus<P> {
    fn drop(&mut self) {
        self.dispatcher.queue().close();
    }
}
