use async_trait::async_trait;

use crate::error::StoreError;
use crate::message::{MessageRef, Payload};

/// Persistence contract used by [`PersistentBus`](super::PersistentBus).
#[async_trait]
pub trait MessageStore<P: Payload>: Send + Sync {
    /// Persists one message.
    async fn store(&self, msg: &MessageRef<P>) -> Result<(), StoreError>;

    /// Returns every persisted message, oldest first.
    async fn load(&self) -> Result<Vec<MessageRef<P>>, StoreError>;

    /// Removes every persisted message.
    async fn clear(&self) -> Result<(), StoreError>;

    /// Releases the store. Later calls fail with [`StoreError::Closed`].
    async fn close(&self) -> Result<(), StoreError>;
}
