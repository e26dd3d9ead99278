//! # Dispatch logging.
//!
//! Emits one `tracing` event per dispatch with the topic, message id, elapsed
//! time and outcome. Failures are logged at `warn`, successes at `debug`.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::Middleware;
use crate::error::HandlerError;
use crate::handlers::{Handler, HandlerRef};
use crate::message::{MessageRef, Payload};

struct Logged<P: Payload> {
    inner: HandlerRef<P>,
}

#[async_trait]
impl<P: Payload> Handler<P> for Logged<P> {
    async fn handle(&self, ctx: CancellationToken, msg: MessageRef<P>) -> Result<(), HandlerError> {
        let started = Instant::now();
        let topic = msg.topic().to_owned();
        let id = msg.id();

        let res = self.inner.handle(ctx, msg).await;
        let elapsed = started.elapsed();
        match &res {
            Ok(()) => debug!(%topic, %id, ?elapsed, "message handled"),
            Err(e) => warn!(%topic, %id, ?elapsed, error = %e, label = e.as_label(), "message handling failed"),
        }
        res
    }
}

/// Creates middleware that logs every dispatch.
pub fn logging<P: Payload>() -> Middleware<P> {
    Arc::new(|inner: HandlerRef<P>| -> HandlerRef<P> { Arc::new(Logged { inner }) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::HandlerFn;
    use crate::message::Message;

    #[tokio::test]
    async fn result_is_passed_through() {
        let failing: HandlerRef<u8> =
            HandlerFn::arc(|_ctx: CancellationToken, _msg: MessageRef<u8>| async { Err(HandlerError::fail("nope")) });
        let ok: HandlerRef<u8> = HandlerFn::arc(|_ctx: CancellationToken, _msg: MessageRef<u8>| async { Ok(()) });

        let msg = Arc::new(Message::new("t", 1_u8));
        let err = logging()(failing)
            .handle(CancellationToken::new(), Arc::clone(&msg))
            .await
            .unwrap_err();
        assert_eq!(err, HandlerError::fail("nope"));
        logging()(ok).handle(CancellationToken::new(), msg).await.unwrap();
    }
}
