//! # Audit history.
//!
//! [`MessageHistory`] is a bounded, queryable log of what happened to messages.
//! It is fed from two sides:
//!
//! ```text
//! AuditableBus::publish*   ──► Published, PublishFailed
//! history_middleware       ──► Delivered, Failed
//! ```

mod auditable;
mod history;

pub use auditable::AuditableBus;
pub use history::{history_middleware, HistoryEntry, HistoryEvent, MessageHistory, DEFAULT_HISTORY_SIZE};
