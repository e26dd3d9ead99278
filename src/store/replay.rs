use std::time::SystemTime;

use async_trait::async_trait;

use super::MessageStore;
use crate::error::StoreError;
use crate::message::{MessageRef, Payload};

/// Store wrapper whose `load` only returns messages created at or after `start`.
///
/// Writes, clears and closes pass straight through.
pub struct ReplayableStore<S> {
    inner: S,
    start: SystemTime,
}

impl<S> ReplayableStore<S> {
    /// Wraps `inner`, replaying from `start` (inclusive).
    pub fn new(inner: S, start: SystemTime) -> Self {
        Self { inner, start }
    }

    /// Replay start time.
    pub fn start(&self) -> SystemTime {
        self.start
    }

    /// Moves the replay start.
    pub fn set_start(&mut self, start: SystemTime) {
        self.start = start;
    }

    /// Wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<P: Payload, S: MessageStore<P>> MessageStore<P> for ReplayableStore<S> {
    async fn store(&self, msg: &MessageRef<P>) -> Result<(), StoreError> {
        self.inner.store(msg).await
    }

    async fn load(&self) -> Result<Vec<MessageRef<P>>, StoreError> {
        let mut all = self.inner.load().await?;
        all.retain(|m| m.timestamp() >= self.start);
        Ok(all)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.inner.clear().await
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.inner.close().await
    }
}
