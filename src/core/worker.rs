//! # Worker pool.
//!
//! A fixed number of long-lived tokio tasks, each looping on
//! [`EnvelopeQueue::recv`](super::EnvelopeQueue::recv) until the queue is closed
//! and drained, retries of in-flight messages included.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

use super::Dispatcher;
use crate::message::Payload;

/// Spawns `count` workers draining the dispatcher's queue.
///
/// Must be called from within a tokio runtime.
pub(crate) fn spawn_pool<P: Payload>(count: usize, dispatcher: &Arc<Dispatcher<P>>) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|worker| spawn_worker(worker, Arc::clone(dispatcher)))
        .collect()
}

fn spawn_worker<P: Payload>(worker: usize, dispatcher: Arc<Dispatcher<P>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(worker, "worker started");
        while let Some(env) = dispatcher.queue().recv().await {
            dispatcher.process(env).await;
            dispatcher.queue().done();
        }
        debug!(worker, "worker stopped");
    })
}
