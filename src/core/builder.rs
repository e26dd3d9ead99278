use crate::config::BusConfig;
use crate::handlers::HandlerRef;
use crate::message::Payload;
use crate::middleware::{Middleware, MiddlewareChain};
use crate::observers::{ObserverRef, ObserverSet};

use super::Bus;

/// Builder for constructing a [`Bus`] with optional features.
pub struct BusBuilder<P: Payload> {
    cfg: BusConfig,
    dead_letter: Option<HandlerRef<P>>,
    observers: Vec<ObserverRef<P>>,
    middleware: MiddlewareChain<P>,
}

impl<P: Payload> BusBuilder<P> {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: BusConfig) -> Self {
        Self {
            cfg,
            dead_letter: None,
            observers: Vec::new(),
            middleware: MiddlewareChain::new(),
        }
    }

    /// Sets the handler invoked once for a message whose retries are exhausted.
    pub fn with_dead_letter(mut self, handler: HandlerRef<P>) -> Self {
        self.dead_letter = Some(handler);
        self
    }

    /// Adds one observer.
    pub fn with_observer(mut self, observer: ObserverRef<P>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Adds several observers, after any already added.
    pub fn with_observers(mut self, observers: Vec<ObserverRef<P>>) -> Self {
        self.observers.extend(observers);
        self
    }

    /// Appends a middleware layer (outermost first).
    pub fn with_middleware(mut self, mw: Middleware<P>) -> Self {
        self.middleware.push(mw);
        self
    }

    /// Builds the bus and starts its workers.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Bus<P> {
        Bus::from_parts(
            self.cfg,
            self.dead_letter,
            ObserverSet::new(self.observers),
            self.middleware,
        )
    }
}

impl<P: Payload> Default for BusBuilder<P> {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}
