//! # Middleware: handler-transforming layers.
//!
//! A [`Middleware`] turns a handler into another handler. Registered middleware
//! is applied on every dispatch, around the aggregate of all matched handlers.
//!
//! ## Composition
//! ```text
//! use(m1, m2, m3)
//!
//! effective = m1(m2(m3(aggregate)))
//!
//!   m1 ─► m2 ─► m3 ─► aggregate ─► m3 ─► m2 ─► m1
//!   (first in, last out)
//! ```
//!
//! A middleware may mutate metadata, short-circuit by not calling the inner
//! handler, or transform the inner handler's error.
//!
//! ## Provided layers
//! - [`filter_middleware`] with [`Filter`] predicates and combinators
//! - [`timeout`] per-dispatch time limit
//! - [`logging`] `tracing` spans of each dispatch (feature `logging`)

mod chain;
mod filter;
#[cfg(feature = "logging")]
mod logging;
mod timeout;

pub use chain::{middleware, Middleware, MiddlewareChain};
pub use filter::{
    and, filter_middleware, metadata_filter, not, or, payload_filter, topic_filter, Filter,
};
#[cfg(feature = "logging")]
pub use logging::logging;
pub use timeout::timeout;
