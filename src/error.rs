//! Error types used by the bus, its handlers and its stores.
//!
//! This module defines three enums:
//!
//! - [`BusError`]: errors returned by bus operations (publish, subscribe, close).
//! - [`HandlerError`]: errors returned by message handlers.
//! - [`StoreError`]: errors returned by message stores and codecs.
//!
//! Each type provides `as_label` for logs/metrics.

use std::time::Duration;

use thiserror::Error;

use crate::core::SubscriptionId;

/// # Errors produced by bus operations.
///
/// Handler failures surface here only through `publish_sync`; on the async path
/// they are absorbed by the retry/dead-letter mechanism.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BusError {
    /// The bus has been closed; no further publishing or subscribing is accepted.
    #[error("bus is closed")]
    Closed,

    /// `close` was called on a bus that is already closed.
    #[error("bus already closed")]
    AlreadyClosed,

    /// The subscription pattern was empty.
    #[error("subscription pattern cannot be empty")]
    InvalidPattern,

    /// No handler was supplied at subscribe time.
    #[error("handler cannot be absent")]
    InvalidHandler,

    /// No subscription with this id is registered.
    #[error("subscription not found: {id}")]
    NotFound {
        /// The unknown subscription id.
        id: SubscriptionId,
    },

    /// The caller's cancellation token fired before the message was enqueued.
    #[error("publish cancelled")]
    Cancelled,

    /// A handler failed during synchronous dispatch.
    #[error(transparent)]
    Handler(#[from] HandlerError),

    /// A decorating bus failed to persist a message.
    #[error("failed to persist message: {0}")]
    Store(#[from] StoreError),
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use topicbus::BusError;
    ///
    /// assert_eq!(BusError::Closed.as_label(), "bus_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::Closed => "bus_closed",
            BusError::AlreadyClosed => "bus_already_closed",
            BusError::InvalidPattern => "invalid_pattern",
            BusError::InvalidHandler => "invalid_handler",
            BusError::NotFound { .. } => "subscription_not_found",
            BusError::Cancelled => "publish_cancelled",
            BusError::Handler(e) => e.as_label(),
            BusError::Store(_) => "store_failed",
        }
    }
}

/// # Errors produced by message handlers.
///
/// The bus never reinterprets these: it only decides whether to retry.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// Handling failed; the message may be retried.
    #[error("handler failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Handling exceeded a time limit imposed by middleware.
    #[error("handler timed out after {timeout:?}")]
    Timeout {
        /// The exceeded limit.
        timeout: Duration,
    },

    /// The handler panicked; the panic was caught by the dispatcher.
    #[error("handler panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },

    /// The handler observed cancellation and gave up.
    #[error("context cancelled")]
    Canceled,
}

impl HandlerError {
    /// Shorthand for [`HandlerError::Fail`].
    ///
    /// ```
    /// use topicbus::HandlerError;
    ///
    /// let err = HandlerError::fail("boom");
    /// assert_eq!(err.to_string(), "handler failed: boom");
    /// ```
    pub fn fail(error: impl std::fmt::Display) -> Self {
        HandlerError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::Fail { .. } => "handler_failed",
            HandlerError::Timeout { .. } => "handler_timeout",
            HandlerError::Panicked { .. } => "handler_panicked",
            HandlerError::Canceled => "handler_canceled",
        }
    }
}

/// # Errors produced by message stores and codecs.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying file I/O failed.
    #[error("store i/o: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding or decoding a message failed.
    #[error("codec: {0}")]
    Codec(#[from] serde_json::Error),

    /// The store was closed.
    #[error("store is closed")]
    Closed,

    /// A table name was not a plain SQL identifier.
    #[error("invalid table name: {name:?}")]
    InvalidTable {
        /// The rejected name.
        name: String,
    },

    /// The SQLite backend failed.
    #[cfg(feature = "sqlite")]
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),
}

impl StoreError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::Io(_) => "store_io",
            StoreError::Codec(_) => "store_codec",
            StoreError::Closed => "store_closed",
            StoreError::InvalidTable { .. } => "store_invalid_table",
            #[cfg(feature = "sqlite")]
            StoreError::Sql(_) => "store_sql",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_error_passes_through_bus_error() {
        let err: BusError = HandlerError::fail("db down").into();
        assert_eq!(err.to_string(), "handler failed: db down");
        assert_eq!(err.as_label(), "handler_failed");
        assert!(matches!(err, BusError::Handler(HandlerError::Fail { .. })));
    }

    #[test]
    fn labels_are_stable() {
        assert_eq!(BusError::AlreadyClosed.as_label(), "bus_already_closed");
        assert_eq!(BusError::Cancelled.as_label(), "publish_cancelled");
        assert_eq!(HandlerError::Canceled.as_label(), "handler_canceled");
        assert_eq!(StoreError::Closed.as_label(), "store_closed");
    }
}
