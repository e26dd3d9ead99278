//! # Subscription handle.
//!
//! A [`Subscription`] is what `subscribe` hands back. It remembers its id and
//! pattern plus a [`Weak`] reference to the dispatcher, so dropping the bus is
//! never prevented by outstanding subscriptions.

use std::fmt;
use std::sync::Weak;

use uuid::Uuid;

use super::dispatcher::Dispatcher;
use crate::error::BusError;
use crate::message::Payload;

/// Unique subscription identifier (random UUID v4).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Generates a fresh id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A registered pattern/handler pair.
pub struct Subscription<P: Payload> {
    id: SubscriptionId,
    pattern: String,
    bus: Weak<Dispatcher<P>>,
}

impl<P: Payload> Subscription<P> {
    pub(crate) fn new(id: SubscriptionId, pattern: String, bus: Weak<Dispatcher<P>>) -> Self {
        Self { id, pattern, bus }
    }

    /// Subscription id.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Pattern this subscription was registered with.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Removes this subscription from its bus.
    ///
    /// # Errors
    /// - [`BusError::NotFound`] if it was already removed (or the bus was closed);
    /// - [`BusError::Closed`] if the bus no longer exists.
    pub fn unsubscribe(&self) -> Result<(), BusError> {
        let bus = self.bus.upgrade().ok_or(BusError::Closed)?;
        bus.unsubscribe(self.id)
    }
}

impl<P: Payload> Clone for Subscription<P> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            pattern: self.pattern.clone(),
            bus: Weak::clone(&self.bus),
        }
    }
}

impl<P: Payload> fmt::Debug for Subscription<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("pattern", &self.pattern)
            .finish()
    }
}
