//! # Per-dispatch time limit.
//!
//! Wraps the inner handler in `tokio::time::timeout`. When the limit is hit the
//! token passed to the inner handler is cancelled and
//! [`HandlerError::Timeout`] is returned, which the dispatcher treats like any
//! other failure (retry, then dead letter).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time;
use tokio_util::sync::CancellationToken;

use super::Middleware;
use crate::error::HandlerError;
use crate::handlers::{Handler, HandlerRef};
use crate::message::{MessageRef, Payload};

struct TimeLimited<P: Payload> {
    limit: Duration,
    inner: HandlerRef<P>,
}

#[async_trait]
impl<P: Payload> Handler<P> for TimeLimited<P> {
    async fn handle(&self, ctx: CancellationToken, msg: MessageRef<P>) -> Result<(), HandlerError> {
        let child = ctx.child_token();
        match time::timeout(self.limit, self.inner.handle(child.clone(), msg)).await {
            Ok(res) => res,
            Err(_elapsed) => {
                child.cancel();
                Err(HandlerError::Timeout {
                    timeout: self.limit,
                })
            }
        }
    }
}

/// Creates middleware that fails a dispatch taking longer than `limit`.
///
/// A zero `limit` disables the check.
pub fn timeout<P: Payload>(limit: Duration) -> Middleware<P> {
    Arc::new(move |inner: HandlerRef<P>| -> HandlerRef<P> {
        if limit.is_zero() {
            return inner;
        }
        Arc::new(TimeLimited { limit, inner })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::HandlerFn;
    use crate::message::Message;

    fn sleeper(d: Duration) -> HandlerRef<()> {
        HandlerFn::arc(move |ctx: CancellationToken, _msg: MessageRef<()>| async move {
            tokio::select! {
                _ = time::sleep(d) => Ok(()),
                _ = ctx.cancelled() => Err(HandlerError::Canceled),
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn slow_handler_times_out() {
        let wrapped = timeout(Duration::from_millis(50))(sleeper(Duration::from_secs(5)));
        let err = wrapped
            .handle(CancellationToken::new(), Arc::new(Message::new("t", ())))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            HandlerError::Timeout {
                timeout: Duration::from_millis(50)
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn fast_handler_passes() {
        let wrapped = timeout(Duration::from_secs(1))(sleeper(Duration::from_millis(10)));
        wrapped
            .handle(CancellationToken::new(), Arc::new(Message::new("t", ())))
            .await
            .unwrap();
    }

    #[test]
    fn zero_limit_is_identity() {
        let inner = sleeper(Duration::ZERO);
        let wrapped = timeout(Duration::ZERO)(Arc::clone(&inner));
        assert!(Arc::ptr_eq(&inner, &wrapped));
    }
}
