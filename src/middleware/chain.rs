//! # Ordered middleware list and its composition.

use std::sync::Arc;

use crate::handlers::HandlerRef;
use crate::message::Payload;

/// A handler transform: receives the inner handler, returns the wrapped one.
pub type Middleware<P> = Arc<dyn Fn(HandlerRef<P>) -> HandlerRef<P> + Send + Sync>;

/// Wraps a closure as a [`Middleware`].
///
/// ```
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
/// use topicbus::{middleware::middleware, Handler, HandlerFn, HandlerRef, MessageRef};
///
/// let tag = middleware(|next: HandlerRef<String>| {
///     HandlerFn::arc(move |ctx: CancellationToken, msg: MessageRef<String>| {
///         let next = Arc::clone(&next);
///         async move {
///             msg.metadata().insert("tagged", true);
///             next.handle(ctx, msg).await
///         }
///     })
/// });
/// # let _ = tag;
/// ```
pub fn middleware<P, F>(f: F) -> Middleware<P>
where
    P: Payload,
    F: Fn(HandlerRef<P>) -> HandlerRef<P> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Middleware in registration order.
pub struct MiddlewareChain<P: Payload> {
    layers: Vec<Middleware<P>>,
}

impl<P: Payload> MiddlewareChain<P> {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Appends one layer.
    pub fn push(&mut self, mw: Middleware<P>) {
        self.layers.push(mw);
    }

    /// Appends several layers, keeping their order.
    pub fn extend(&mut self, mws: impl IntoIterator<Item = Middleware<P>>) {
        self.layers.extend(mws);
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// True if no layer is registered.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Wraps `handler` so that the first registered layer runs outermost.
    pub fn wrap(&self, handler: HandlerRef<P>) -> HandlerRef<P> {
        self.layers
            .iter()
            .rev()
            .fold(handler, |inner, mw| mw(inner))
    }
}

impl<P: Payload> Default for MiddlewareChain<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Payload> Clone for MiddlewareChain<P> {
    fn clone(&self) -> Self {
        Self {
            layers: self.layers.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::handlers::{Handler, HandlerFn};
    use crate::message::{Message, MessageRef};
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    fn recording(name: &'static str, log: Arc<Mutex<Vec<String>>>) -> Middleware<()> {
        middleware(move |next: HandlerRef<()>| {
            let log = Arc::clone(&log);
            HandlerFn::arc(move |ctx: CancellationToken, msg: MessageRef<()>| {
                let next = Arc::clone(&next);
                let log = Arc::clone(&log);
                async move {
                    log.lock().unwrap().push(format!("{name}:in"));
                    let res = next.handle(ctx, msg).await;
                    log.lock().unwrap().push(format!("{name}:out"));
                    res
                }
            })
        })
    }

    #[tokio::test]
    async fn first_registered_runs_outermost() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = MiddlewareChain::new();
        chain.push(recording("m1", Arc::clone(&log)));
        chain.extend([
            recording("m2", Arc::clone(&log)),
            recording("m3", Arc::clone(&log)),
        ]);
        assert_eq!(chain.len(), 3);

        let inner_log = Arc::clone(&log);
        let inner: HandlerRef<()> = HandlerFn::arc(move |_ctx: CancellationToken, _msg: MessageRef<()>| {
            let log = Arc::clone(&inner_log);
            async move {
                log.lock().unwrap().push("handler".to_string());
                Ok(())
            }
        });

        chain
            .wrap(inner)
            .handle(CancellationToken::new(), Arc::new(Message::new("t", ())))
            .await
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["m1:in", "m2:in", "m3:in", "handler", "m3:out", "m2:out", "m1:out"]
        );
    }

    #[tokio::test]
    async fn middleware_can_short_circuit_and_rewrite_errors() {
        let deny = middleware(|_next: HandlerRef<()>| {
            HandlerFn::arc(|_ctx: CancellationToken, _msg: MessageRef<()>| async {
                Err(HandlerError::fail("denied"))
            })
        });
        let mut chain = MiddlewareChain::new();
        chain.push(deny);

        let inner: HandlerRef<()> = HandlerFn::arc(|_ctx: CancellationToken, _msg: MessageRef<()>| async {
            panic!("inner handler must not run")
        });
        let err = chain
            .wrap(inner)
            .handle(CancellationToken::new(), Arc::new(Message::new("t", ())))
            .await
            .unwrap_err();
        assert_eq!(err, HandlerError::fail("denied"));
    }

    #[test]
    fn empty_chain_returns_handler_itself() {
        let chain: MiddlewareChain<()> = MiddlewareChain::default();
        let inner: HandlerRef<()> =
            HandlerFn::arc(|_ctx: CancellationToken, _msg: MessageRef<()>| async { Ok(()) });
        let wrapped = chain.wrap(Arc::clone(&inner));
        assert!(Arc::ptr_eq(&inner, &wrapped));
        assert!(chain.is_empty());
    }
}
