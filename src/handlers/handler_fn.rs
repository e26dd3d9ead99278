//! # Function-backed handler (`HandlerFn`)
//!
//! [`HandlerFn`] wraps a closure `F: Fn(CancellationToken, MessageRef<P>) -> Fut`,
//! producing a fresh future per message. State shared across calls must be
//! captured explicitly (e.g. an `Arc<Mutex<_>>`).
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use topicbus::{HandlerError, HandlerFn, HandlerRef, MessageRef};
//!
//! let h: HandlerRef<String> = HandlerFn::arc(|_ctx: CancellationToken, msg: MessageRef<String>| async move {
//!     println!("got {}", msg.payload());
//!     Ok::<_, HandlerError>(())
//! });
//! # let _ = h;
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;
use crate::handlers::{Handler, HandlerRef};
use crate::message::{MessageRef, Payload};

/// Function-backed handler implementation.
#[derive(Clone, Debug)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F> HandlerFn<F> {
    /// Creates a new function-backed handler.
    ///
    /// Prefer [`HandlerFn::arc`] when you immediately need a [`HandlerRef`].
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the handler and returns it as a shared handle (`Arc<dyn Handler<P>>`).
    pub fn arc<P, Fut>(f: F) -> HandlerRef<P>
    where
        P: Payload,
        F: Fn(CancellationToken, MessageRef<P>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<P, F, Fut> Handler<P> for HandlerFn<F>
where
    P: Payload,
    F: Fn(CancellationToken, MessageRef<P>) -> Fut + Send + Sync + 'static, // Fn, not FnMut
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, ctx: CancellationToken, msg: MessageRef<P>) -> Result<(), HandlerError> {
        (self.f)(ctx, msg).await
    }
}
