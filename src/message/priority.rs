//! # Message priority levels.
//!
//! Priority is threaded through messages and queue envelopes, but the dispatcher
//! does not reorder work by it: envelopes are drained in FIFO order.

use serde::{Deserialize, Serialize};

/// Priority tag carried by a message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Background work.
    Low,
    /// Default for `publish` and `publish_sync`.
    #[default]
    Normal,
    /// Above normal.
    High,
    /// Highest level.
    Urgent,
}

impl Priority {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_and_default() {
        assert_eq!(Priority::default(), Priority::Normal);
        assert!(Priority::Low < Priority::Normal);
        assert!(Priority::High < Priority::Urgent);
    }

    #[test]
    fn serde_uses_snake_case() {
        let s = serde_json::to_string(&Priority::Urgent).unwrap();
        assert_eq!(s, "\"urgent\"");
        let p: Priority = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(p, Priority::Low);
    }
}
