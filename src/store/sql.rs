//! # SQLite-backed store.
//!
//! One row per message. `id`, `topic` and `timestamp` are real columns so they
//! can be queried; the full message is kept in `body`, encoded by the store's
//! [`Codec`].
//!
//! ```text
//! CREATE TABLE IF NOT EXISTS <table> (
//!     seq       INTEGER PRIMARY KEY AUTOINCREMENT,
//!     id        TEXT NOT NULL UNIQUE,
//!     topic     TEXT NOT NULL,
//!     timestamp INTEGER NOT NULL,   -- nanoseconds since the unix epoch
//!     body      BLOB NOT NULL
//! )
//! ```
//!
//! ## Rules
//! - Rows come back ordered by `timestamp`, then insertion order.
//! - Storing the same message id twice is an error.
//! - `rusqlite` is blocking: every statement runs on `spawn_blocking`.
//! - After [`close`](MessageStore::close) the connection is dropped and every
//!   call fails with [`StoreError::Closed`].

use std::io;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::MessageStore;
use crate::codec::{Codec, JsonCodec, StoredMessage};
use crate::error::StoreError;
use crate::message::{Message, MessageRef, Payload};

/// Table used when none is given.
pub const DEFAULT_TABLE: &str = "topicbus_messages";

type Shared = Arc<Mutex<Option<Connection>>>;

/// Store persisting messages to a SQLite table.
pub struct SqlStore<P, C = JsonCodec> {
    conn: Shared,
    table: Arc<str>,
    codec: C,
    _payload: PhantomData<fn() -> P>,
}

impl<P> SqlStore<P, JsonCodec> {
    /// Opens (or creates) the database at `path` with the default table.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open(path)?, DEFAULT_TABLE, JsonCodec::default())
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?, DEFAULT_TABLE, JsonCodec::default())
    }
}

impl<P, C> SqlStore<P, C> {
    /// Uses `conn`, creating `table` if needed.
    ///
    /// # Errors
    /// [`StoreError::InvalidTable`] unless `table` is a plain identifier
    /// (ASCII letters, digits and `_`, not starting with a digit).
    pub fn from_connection(conn: Connection, table: &str, codec: C) -> Result<Self, StoreError> {
        if !is_identifier(table) {
            return Err(StoreError::InvalidTable {
                name: table.to_owned(),
            });
        }
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                topic TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                body BLOB NOT NULL
            );
            CREATE INDEX IF NOT EXISTS {table}_topic ON {table} (topic);
            CREATE INDEX IF NOT EXISTS {table}_timestamp ON {table} (timestamp);"
        ))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            table: Arc::from(table),
            codec,
            _payload: PhantomData,
        })
    }

    /// Table holding the messages.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Runs `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, &str) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let table = Arc::clone(&self.table);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().unwrap_or_else(|e| e.into_inner());
            let conn = guard.as_ref().ok_or(StoreError::Closed)?;
            f(conn, &table)
        })
        .await
        .map_err(|e| StoreError::Io(io::Error::other(e)))?
    }
}

impl<P, C> SqlStore<P, C>
where
    P: Payload + Clone + Serialize + DeserializeOwned,
    C: Codec,
{
    fn decode_rows(&self, bodies: Vec<Vec<u8>>) -> Result<Vec<MessageRef<P>>, StoreError> {
        bodies
            .iter()
            .map(|body| {
                let stored: StoredMessage<P> = self.codec.decode(body)?;
                Ok(Arc::new(Message::from(stored)))
            })
            .collect()
    }

    async fn select(&self, filter: Filter) -> Result<Vec<MessageRef<P>>, StoreError> {
        let bodies = self
            .with_conn(move |conn, table| {
                let (clause, arg) = match &filter {
                    Filter::All => ("", None),
                    Filter::Topic(topic) => ("WHERE topic = ?1", Some(Value::from(topic.clone()))),
                    Filter::After(nanos) => ("WHERE timestamp > ?1", Some(Value::from(*nanos))),
                };
                let mut stmt = conn.prepare(&format!(
                    "SELECT body FROM {table} {clause} ORDER BY timestamp ASC, seq ASC"
                ))?;
                let rows = stmt.query_map(params_from_iter(arg), |row| row.get::<_, Vec<u8>>(0))?;
                let bodies = rows.collect::<Result<Vec<_>, _>>()?;
                Ok(bodies)
            })
            .await?;
        self.decode_rows(bodies)
    }

    /// Messages published on exactly `topic`, oldest first.
    pub async fn load_by_topic(&self, topic: &str) -> Result<Vec<MessageRef<P>>, StoreError> {
        self.select(Filter::Topic(topic.to_owned())).await
    }

    /// Messages strictly newer than `after`, oldest first.
    pub async fn load_after(&self, after: SystemTime) -> Result<Vec<MessageRef<P>>, StoreError> {
        self.select(Filter::After(epoch_nanos(after))).await
    }

    /// Deletes messages strictly older than `before`; returns how many went.
    pub async fn clear_before(&self, before: SystemTime) -> Result<usize, StoreError> {
        let cutoff = epoch_nanos(before);
        let removed = self
            .with_conn(move |conn, table| {
                Ok(conn.execute(&format!("DELETE FROM {table} WHERE timestamp < ?1"), params![cutoff])?)
            })
            .await?;
        debug!(table = %self.table, removed, "old messages cleared");
        Ok(removed)
    }

    /// Number of stored messages.
    pub async fn count(&self) -> Result<usize, StoreError> {
        self.with_conn(|conn, table| {
            let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(usize::try_from(n).unwrap_or_default())
        })
        .await
    }
}

enum Filter {
    All,
    Topic(String),
    After(i64),
}

#[async_trait]
impl<P, C> MessageStore<P> for SqlStore<P, C>
where
    P: Payload + Clone + Serialize + DeserializeOwned,
    C: Codec,
{
    async fn store(&self, msg: &MessageRef<P>) -> Result<(), StoreError> {
        let body = self.codec.encode(&StoredMessage::from_message(msg))?;
        let id = msg.id().to_string();
        let topic = msg.topic().to_owned();
        let timestamp = epoch_nanos(msg.timestamp());
        self.with_conn(move |conn, table| {
            conn.execute(
                &format!("INSERT INTO {table} (id, topic, timestamp, body) VALUES (?1, ?2, ?3, ?4)"),
                params![id, topic, timestamp, body],
            )?;
            Ok(())
        })
        .await?;
        debug!(table = %self.table, id = %msg.id(), "message persisted");
        Ok(())
    }

    async fn load(&self) -> Result<Vec<MessageRef<P>>, StoreError> {
        self.select(Filter::All).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.with_conn(|conn, table| {
            conn.execute(&format!("DELETE FROM {table}"), [])?;
            Ok(())
        })
        .await
    }

    async fn close(&self) -> Result<(), StoreError> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(|e| e.into_inner()).take();
            match conn {
                Some(conn) => conn.close().map_err(|(_, e)| StoreError::from(e)),
                None => Ok(()),
            }
        })
        .await
        .map_err(|e| StoreError::Io(io::Error::other(e)))?
    }
}

fn epoch_nanos(t: SystemTime) -> i64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessageId, Priority};
    use std::collections::HashMap;
    use std::time::Duration;

    fn at(secs: u64, topic: &str, payload: &str) -> MessageRef<String> {
        Arc::new(Message::from_parts(
            MessageId::new(),
            topic.to_owned(),
            payload.to_owned(),
            HashMap::new(),
            UNIX_EPOCH + Duration::from_secs(secs),
            Priority::Normal,
        ))
    }

    fn secs(n: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(n)
    }

    #[tokio::test]
    async fn persists_across_reopen_in_timestamp_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bus.db");

        let store: SqlStore<String> = SqlStore::open(&path).unwrap();
        let late = at(30, "orders.paid", "c");
        late.metadata().insert("tenant", "eu-1");
        store.store(&late).await.unwrap();
        store.store(&at(10, "orders.created", "a")).await.unwrap();
        store.store(&at(20, "users.created", "b")).await.unwrap();
        store.close().await.unwrap();

        let reopened: SqlStore<String> = SqlStore::open(&path).unwrap();
        let loaded = reopened.load().await.unwrap();
        let payloads: Vec<&str> = loaded.iter().map(|m| m.payload().as_str()).collect();
        assert_eq!(payloads, vec!["a", "b", "c"]);
        assert_eq!(loaded[2].id(), late.id());
        assert_eq!(loaded[2].timestamp(), secs(30));
        assert_eq!(loaded[2].metadata().get("tenant"), Some(serde_json::json!("eu-1")));
        assert_eq!(reopened.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn topic_and_time_queries() {
        let store: SqlStore<String> = SqlStore::open_in_memory().unwrap();
        for (t, topic, p) in [(1, "a", "1"), (2, "b", "2"), (3, "a", "3"), (4, "a", "4")] {
            store.store(&at(t, topic, p)).await.unwrap();
        }

        let by_topic = store.load_by_topic("a").await.unwrap();
        assert_eq!(by_topic.iter().map(|m| m.payload().as_str()).collect::<Vec<_>>(), vec!["1", "3", "4"]);
        assert!(store.load_by_topic("a.*").await.unwrap().is_empty());

        // strictly after
        let after = store.load_after(secs(2)).await.unwrap();
        assert_eq!(after.iter().map(|m| m.payload().as_str()).collect::<Vec<_>>(), vec!["3", "4"]);

        // strictly before
        assert_eq!(store.clear_before(secs(3)).await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 2);

        store.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let store: SqlStore<String> = SqlStore::open_in_memory().unwrap();
        let msg = at(1, "a", "x");
        store.store(&msg).await.unwrap();
        assert!(matches!(store.store(&msg).await, Err(StoreError::Sql(_))));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn closed_store_rejects_calls() {
        let store: SqlStore<String> = SqlStore::open_in_memory().unwrap();
        store.close().await.unwrap();
        assert!(matches!(store.load().await, Err(StoreError::Closed)));
        assert!(matches!(store.store(&at(1, "a", "x")).await, Err(StoreError::Closed)));
        store.close().await.unwrap();
    }

    #[test]
    fn table_name_must_be_an_identifier() {
        let conn = Connection::open_in_memory().unwrap();
        let err = SqlStore::<String>::from_connection(conn, "x; DROP TABLE y", JsonCodec::default())
            .err()
            .unwrap();
        assert!(matches!(err, StoreError::InvalidTable { .. }));

        let conn = Connection::open_in_memory().unwrap();
        let store = SqlStore::<String>::from_connection(conn, "audit_2024", JsonCodec::default()).unwrap();
        assert_eq!(store.table(), "audit_2024");
        assert!(!is_identifier("9lives"));
        assert!(!is_identifier(""));
    }
}
