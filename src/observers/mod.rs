//! # Observers of bus activity.
//!
//! Observers are passive: the bus calls their hooks synchronously at fixed points
//! and never lets them alter control flow. A panicking observer is isolated by
//! [`ObserverSet`] and logged.
//!
//! ```text
//!   publish*      ──► on_publish(topic, msg)
//!   subscribe     ──► on_subscribe(pattern)
//!   unsubscribe   ──► on_unsubscribe(pattern)
//!   dispatch      ──► on_message_processed(msg, result)
//!   close         ──► on_close()
//!                          │
//!          ┌───────────────┼───────────────┐
//!          ▼               ▼               ▼
//!      LogObserver    StatsObserver   CustomObserver
//! ```

#[cfg(feature = "logging")]
mod log;
mod observer;
mod set;
mod stats;

#[cfg(feature = "logging")]
pub use log::LogObserver;
pub use observer::{Observer, ObserverRef};
pub use set::ObserverSet;
pub(crate) use set::panic_message;
pub use stats::{StatsObserver, StatsSnapshot};
