//! Bus core: registry, queue, dispatcher and the public facade.
//!
//! The public entry points are [`Bus`], [`BusBuilder`] and the [`MessageBus`]
//! capability trait implemented by the bus and its decorators.
//!
//! Internal modules:
//! - [`registry`]: pattern → subscription index;
//! - [`envelope`] / [`queue`]: the unit of work and the bounded queue carrying it;
//! - [`dispatcher`]: handler resolution, middleware wrapping, retry and dead letter;
//! - `worker`: the long-lived tasks draining the queue;
//! - `bus`: lifecycle and the [`MessageBus`] implementation.

mod builder;
mod bus;
pub mod dispatcher;
pub mod envelope;
pub mod queue;
pub mod registry;
mod subscription;
mod worker;

pub use builder::BusBuilder;
pub use bus::{Bus, MessageBus};
pub use dispatcher::Dispatcher;
pub use envelope::Envelope;
pub use queue::EnvelopeQueue;
pub use registry::Registry;
pub use subscription::{Subscription, SubscriptionId};
