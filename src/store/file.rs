//! # File-backed store.
//!
//! Keeps every message in one file holding a JSON array of
//! [`StoredMessage`]s. Each `store` rewrites the whole file.
//!
//! ## Rules
//! - A missing or empty file loads as no messages.
//! - `clear` deletes the file; a file that is already gone is fine.
//! - Calls are serialized by an async mutex, so concurrent stores never lose
//!   each other's writes.

use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use super::MessageStore;
use crate::codec::{Codec, JsonCodec, StoredMessage};
use crate::error::StoreError;
use crate::message::{Message, MessageRef, Payload};

/// Store persisting messages to a single file.
pub struct FileStore<P, C = JsonCodec> {
    path: PathBuf,
    codec: C,
    lock: Mutex<()>,
    closed: AtomicBool,
    _payload: PhantomData<fn() -> P>,
}

impl<P> FileStore<P, JsonCodec> {
    /// Creates a store at `path` using indented JSON.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::with_codec(path, JsonCodec::pretty())
    }
}

impl<P, C> FileStore<P, C> {
    /// Creates a store at `path` using `codec`.
    pub fn with_codec(path: impl AsRef<Path>, codec: C) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            codec,
            lock: Mutex::new(()),
            closed: AtomicBool::new(false),
            _payload: PhantomData,
        }
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

impl<P, C> FileStore<P, C>
where
    P: Payload + Clone + Serialize + DeserializeOwned,
    C: Codec,
{
    async fn read_all(&self) -> Result<Vec<StoredMessage<P>>, StoreError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        self.codec.decode(&bytes)
    }

    async fn write_all(&self, messages: &[StoredMessage<P>]) -> Result<(), StoreError> {
        let bytes = self.codec.encode(messages)?;
        fs::write(&self.path, bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl<P, C> MessageStore<P> for FileStore<P, C>
where
    P: Payload + Clone + Serialize + DeserializeOwned,
    C: Codec,
{
    async fn store(&self, msg: &MessageRef<P>) -> Result<(), StoreError> {
        self.ensure_open()?;
        let _guard = self.lock.lock().await;
        let mut messages = self.read_all().await?;
        messages.push(StoredMessage::from_message(msg));
        self.write_all(&messages).await?;
        debug!(path = %self.path.display(), count = messages.len(), "message persisted");
        Ok(())
    }

    async fn load(&self) -> Result<Vec<MessageRef<P>>, StoreError> {
        self.ensure_open()?;
        let _guard = self.lock.lock().await;
        let messages = self.read_all().await?;
        Ok(messages
            .into_iter()
            .map(|s| Arc::new(Message::from(s)))
            .collect())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.ensure_open()?;
        let _guard = self.lock.lock().await;
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Priority;

    #[tokio::test]
    async fn missing_file_loads_empty_and_clear_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store: FileStore<String> = FileStore::new(dir.path().join("absent.json"));
        assert!(store.load().await.unwrap().is_empty());
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn round_trips_messages_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messages.json");
        let store: FileStore<String> = FileStore::new(&path);

        let first = Arc::new(Message::new("a", "one".to_string()));
        first.metadata().insert("k", "v");
        let second = Arc::new(Message::with_priority("b", "two".to_string(), Priority::Urgent));
        store.store(&first).await.unwrap();
        store.store(&second).await.unwrap();

        // a fresh store over the same file sees the same data
        let reopened: FileStore<String> = FileStore::new(&path);
        let loaded = reopened.load().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id(), first.id());
        assert_eq!(loaded[0].payload(), "one");
        assert_eq!(loaded[0].metadata().get("k"), Some(serde_json::json!("v")));
        assert_eq!(loaded[1].topic(), "b");
        assert_eq!(loaded[1].priority(), Priority::Urgent);

        reopened.clear().await.unwrap();
        assert!(!path.exists());
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_file_loads_empty_and_corrupt_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.json");
        std::fs::write(&path, b"").unwrap();
        let store: FileStore<u8> = FileStore::with_codec(&path, JsonCodec::default());
        assert!(store.load().await.unwrap().is_empty());

        std::fs::write(&path, b"{broken").unwrap();
        let err = store.load().await.unwrap_err();
        assert!(matches!(err, StoreError::Codec(_)));
    }

    #[tokio::test]
    async fn closed_store_rejects_calls() {
        let dir = tempfile::tempdir().unwrap();
        let store: FileStore<u8> = FileStore::new(dir.path().join("m.json"));
        store.close().await.unwrap();
        assert!(matches!(store.load().await, Err(StoreError::Closed)));
    }
}
