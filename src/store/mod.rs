//! # Message persistence.
//!
//! Stores are consumed by [`PersistentBus`], a decorator over any
//! [`MessageBus`](crate::MessageBus). The bus itself never touches a store.
//!
//! ```text
//! PersistentBus::publish*(msg)
//!     ├─► store.store(msg)   ── error ─► BusError::Store (nothing published)
//!     └─► inner.publish*(msg)
//!
//! PersistentBus::replay()
//!     └─► store.load() ─► inner.publish(msg) for each, stop at first error
//! ```
//!
//! Implementations:
//! - [`InMemoryStore`]: bounded, oldest entries trimmed first;
//! - [`FileStore`]: a single JSON array file;
//! - [`ReplayableStore`]: wraps another store and loads only messages newer
//!   than a start time;
//! - [`SqlStore`]: a SQLite table with topic and time queries (feature `sqlite`).

mod file;
mod memory;
mod persistent;
mod replay;
#[cfg(feature = "sqlite")]
mod sql;
mod store;

pub use file::FileStore;
pub use memory::{InMemoryStore, DEFAULT_STORE_SIZE};
pub use persistent::PersistentBus;
pub use replay::ReplayableStore;
#[cfg(feature = "sqlite")]
pub use sql::{SqlStore, DEFAULT_TABLE};
pub use store::MessageStore;
