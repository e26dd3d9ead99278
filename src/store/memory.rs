use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::MessageStore;
use crate::error::StoreError;
use crate::message::{MessageRef, Payload};

/// Capacity used when an [`InMemoryStore`] is created with `0`.
pub const DEFAULT_STORE_SIZE: usize = 10_000;

/// Bounded in-memory store; the oldest messages are dropped first.
pub struct InMemoryStore<P: Payload> {
    messages: RwLock<VecDeque<MessageRef<P>>>,
    max_size: usize,
    closed: AtomicBool,
}

impl<P: Payload> InMemoryStore<P> {
    /// Creates a store holding at most `max_size` messages (`0` → [`DEFAULT_STORE_SIZE`]).
    pub fn new(max_size: usize) -> Self {
        let max_size = if max_size == 0 { DEFAULT_STORE_SIZE } else { max_size };
        Self {
            messages: RwLock::new(VecDeque::new()),
            max_size,
            closed: AtomicBool::new(false),
        }
    }

    /// Maximum number of retained messages.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Number of retained messages.
    pub fn len(&self) -> usize {
        self.messages.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// True if nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

impl<P: Payload> Default for InMemoryStore<P> {
    fn default() -> Self {
        Self::new(DEFAULT_STORE_SIZE)
    }
}

#[async_trait]
impl<P: Payload> MessageStore<P> for InMemoryStore<P> {
    async fn store(&self, msg: &MessageRef<P>) -> Result<(), StoreError> {
        self.ensure_open()?;
        let mut messages = self.messages.write().unwrap_or_else(|e| e.into_inner());
        messages.push_back(Arc::clone(msg));
        while messages.len() > self.max_size {
            messages.pop_front();
        }
        Ok(())
    }

    async fn load(&self) -> Result<Vec<MessageRef<P>>, StoreError> {
        self.ensure_open()?;
        let messages = self.messages.read().unwrap_or_else(|e| e.into_inner());
        Ok(messages.iter().cloned().collect())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.messages.write().unwrap_or_else(|e| e.into_inner()).clear();
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
