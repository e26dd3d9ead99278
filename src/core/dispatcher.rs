//! # Dispatcher: resolve, wrap, invoke, retry.
//!
//! Shared state behind every [`Bus`](crate::Bus): lifecycle flag, registry,
//! middleware, dead-letter handler, observers and the envelope queue.
//!
//! ## Per-envelope state machine
//! ```text
//! Queued ──► Dispatched ──┬─► Success            (envelope dropped)
//!                         ├─► Retrying ─► Queued (retries < max_retries)
//!                         └─► DeadLettered       (retries == max_retries)
//! ```
//!
//! ## Rules
//! - No matching handler: the message is dropped silently.
//! - Every matched handler runs, in order; the last error wins.
//! - The aggregate is wrapped by the middleware chain as it is *now*, so
//!   middleware added later applies to every later dispatch.
//! - A panic anywhere in the wrapped handler becomes [`HandlerError::Panicked`].
//! - The dead-letter handler runs at most once per envelope; its error is logged
//!   and discarded.
//! - Retries bypass the closed queue guard, so `close` never shortens the retry
//!   budget of a message that was already accepted.
//! - Lock order is always bus state, then registry.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{Envelope, EnvelopeQueue, Registry, Subscription, SubscriptionId};
use crate::config::BusConfig;
use crate::error::{BusError, HandlerError};
use crate::handlers::{Handler, HandlerRef};
use crate::message::{MessageRef, Payload};
use crate::middleware::{Middleware, MiddlewareChain};
use crate::observers::{panic_message, ObserverSet};

#[derive(Debug, Default)]
struct BusState {
    closed: bool,
}

/// Runs every matched handler in order and keeps the last error.
struct Aggregate<P: Payload> {
    handlers: Vec<HandlerRef<P>>,
}

#[async_trait]
impl<P: Payload> Handler<P> for Aggregate<P> {
    async fn handle(&self, ctx: CancellationToken, msg: MessageRef<P>) -> Result<(), HandlerError> {
        let mut last = Ok(());
        for h in &self.handlers {
            if let Err(e) = h.handle(ctx.clone(), Arc::clone(&msg)).await {
                last = Err(e);
            }
        }
        last
    }
}

/// Dispatch engine shared by the bus facade, its workers and its subscriptions.
pub struct Dispatcher<P: Payload> {
    cfg: BusConfig,
    state: RwLock<BusState>,
    registry: Registry<P>,
    middleware: RwLock<MiddlewareChain<P>>,
    dead_letter: Option<HandlerRef<P>>,
    observers: ObserverSet<P>,
    queue: EnvelopeQueue<P>,
}

impl<P: Payload> Dispatcher<P> {
    pub(crate) fn new(
        cfg: BusConfig,
        dead_letter: Option<HandlerRef<P>>,
        observers: ObserverSet<P>,
        middleware: MiddlewareChain<P>,
    ) -> Self {
        let queue = EnvelopeQueue::new(cfg.queue_capacity_clamped());
        Self {
            cfg,
            state: RwLock::new(BusState::default()),
            registry: Registry::new(),
            middleware: RwLock::new(middleware),
            dead_letter,
            observers,
            queue,
        }
    }

    pub(crate) fn config(&self) -> &BusConfig {
        &self.cfg
    }

    pub(crate) fn queue(&self) -> &EnvelopeQueue<P> {
        &self.queue
    }

    pub(crate) fn registry(&self) -> &Registry<P> {
        &self.registry
    }

    pub(crate) fn observers(&self) -> &ObserverSet<P> {
        &self.observers
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.read().unwrap_or_else(|e| e.into_inner()).closed
    }

    fn ensure_open(&self) -> Result<(), BusError> {
        if self.is_closed() {
            return Err(BusError::Closed);
        }
        Ok(())
    }

    /// Flips the closed flag; fails if it was already set.
    pub(crate) fn mark_closed(&self) -> Result<(), BusError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if state.closed {
            return Err(BusError::AlreadyClosed);
        }
        state.closed = true;
        Ok(())
    }

    pub(crate) fn subscribe(
        self: &Arc<Self>,
        pattern: &str,
        handler: Option<HandlerRef<P>>,
    ) -> Result<Subscription<P>, BusError> {
        let id = {
            let state = self.state.read().unwrap_or_else(|e| e.into_inner());
            if state.closed {
                return Err(BusError::Closed);
            }
            self.registry.add(pattern, handler)?
        };
        debug!(pattern, %id, "subscribed");
        self.observers.subscribe(pattern);
        Ok(Subscription::new(id, pattern.to_owned(), Arc::downgrade(self)))
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> Result<(), BusError> {
        let pattern = self.registry.remove(id)?;
        debug!(pattern = %pattern, %id, "unsubscribed");
        self.observers.unsubscribe(&pattern);
        Ok(())
    }

    pub(crate) fn use_middleware(&self, mw: Middleware<P>) {
        self.middleware
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(mw);
    }

    fn middleware_snapshot(&self) -> MiddlewareChain<P> {
        self.middleware
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Enqueues a message for asynchronous dispatch.
    pub(crate) async fn publish(&self, ctx: &CancellationToken, msg: MessageRef<P>) -> Result<(), BusError> {
        self.ensure_open()?;
        let env = Envelope::new(msg);

        // on_publish fires inside the send, before a worker can dispatch
        let accepted = self.queue.send_with(env, |env| {
            debug!(topic = env.message.topic(), id = %env.message.id(), "enqueued");
            self.observers.publish(env.message.topic(), &env.message);
        });
        tokio::select! {
            biased;
            res = accepted => res.map_err(|_| BusError::Closed),
            _ = ctx.cancelled() => Err(BusError::Cancelled),
        }
    }

    /// Dispatches a message on the caller's task and returns the handler outcome.
    pub(crate) async fn publish_sync(&self, ctx: &CancellationToken, msg: MessageRef<P>) -> Result<(), BusError> {
        self.ensure_open()?;
        self.observers.publish(msg.topic(), &msg);

        match self.dispatch(ctx.clone(), msg).await {
            Some(Err(e)) => Err(BusError::Handler(e)),
            Some(Ok(())) | None => Ok(()),
        }
    }

    /// One dispatch attempt. `None` means no handler matched.
    async fn dispatch(&self, ctx: CancellationToken, msg: MessageRef<P>) -> Option<Result<(), HandlerError>> {
        let handlers = self.registry.handlers_for(msg.topic());
        if handlers.is_empty() {
            debug!(topic = msg.topic(), id = %msg.id(), "no subscribers, message dropped");
            return None;
        }
        debug!(topic = msg.topic(), id = %msg.id(), handlers = handlers.len(), "dispatching");

        let chain = self.middleware_snapshot();
        let target = Arc::clone(&msg);
        let attempt = async move {
            let handler = chain.wrap(Arc::new(Aggregate { handlers }));
            handler.handle(ctx, target).await
        };
        let res = match AssertUnwindSafe(attempt).catch_unwind().await {
            Ok(res) => res,
            Err(panic_err) => {
                let info = panic_message(panic_err.as_ref());
                warn!(topic = msg.topic(), id = %msg.id(), panic = %info, "handler panicked");
                Err(HandlerError::Panicked { info })
            }
        };

        self.observers.message_processed(&msg, res.as_ref().map(|_| ()));
        Some(res)
    }

    /// Worker entry point: dispatch one envelope and route its failure.
    pub(crate) async fn process(&self, mut env: Envelope<P>) {
        let msg = Arc::clone(&env.message);
        let Some(Err(err)) = self.dispatch(CancellationToken::new(), msg).await else {
            return;
        };

        env.retries += 1;
        if env.retries < self.cfg.max_retries {
            debug!(
                topic = env.message.topic(),
                id = %env.message.id(),
                retries = env.retries,
                error = %err,
                "re-enqueueing failed message"
            );
            match self.queue.requeue(env).await {
                Ok(()) => return,
                Err(returned) => env = returned,
            }
            debug!(id = %env.message.id(), "queue gone during retry");
        }

        warn!(
            topic = env.message.topic(),
            id = %env.message.id(),
            retries = env.retries,
            error = %err,
            "retries exhausted"
        );
        self.dead_letter(env.message).await;
    }

    async fn dead_letter(&self, msg: MessageRef<P>) {
        let Some(dlq) = &self.dead_letter else {
            debug!(topic = msg.topic(), id = %msg.id(), "no dead-letter handler, message dropped");
            return;
        };

        let id = msg.id();
        let fut = dlq.handle(CancellationToken::new(), msg);
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(%id, error = %e, "dead-letter handler failed"),
            Err(panic_err) => warn!(
                %id,
                panic = %panic_message(panic_err.as_ref()),
                "dead-letter handler panicked"
            ),
        }
    }
}
