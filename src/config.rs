//! # Bus configuration.
//!
//! Provides [`BusConfig`], the settings accepted by [`BusBuilder`](crate::BusBuilder)
//! when a bus is constructed.
//!
//! ## Sentinel values
//! - `workers = 0` → clamped to 1 (a bus always has at least one worker)
//! - `queue_capacity = 0` → clamped to 1
//! - `max_retries = 0` → a failed message goes straight to the dead-letter handler

use serde::{Deserialize, Serialize};

/// Default number of dispatch workers.
pub const DEFAULT_WORKERS: usize = 10;

/// Default retry bound (counts the initial attempt).
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default capacity of the envelope queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Configuration for a [`Bus`](crate::Bus).
///
/// ## Field semantics
/// - `workers`: number of long-lived dispatch tasks draining the queue
/// - `max_retries`: total attempts for a failing message before it is dead-lettered
/// - `queue_capacity`: bound of the envelope queue; async publishers wait when it is full
///
/// ## Notes
/// All fields are public. Prefer the clamped accessors over reading raw values.
///
/// ```
/// use topicbus::BusConfig;
///
/// let cfg: BusConfig = serde_json::from_str(r#"{ "workers": 4 }"#).unwrap();
/// assert_eq!(cfg.workers, 4);
/// assert_eq!(cfg.max_retries, 3);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Number of dispatch workers.
    pub workers: usize,

    /// Attempt bound for failing messages.
    ///
    /// A message whose handler keeps failing is dispatched `max_retries` times
    /// (at least once) and then handed to the dead-letter handler.
    pub max_retries: u32,

    /// Capacity of the bounded envelope queue.
    pub queue_capacity: usize,
}

impl BusConfig {
    /// Worker count clamped to a minimum of 1.
    #[inline]
    pub fn workers_clamped(&self) -> usize {
        self.workers.max(1)
    }

    /// Queue capacity clamped to a minimum of 1.
    ///
    /// The queue should use this value to avoid constructing an invalid channel.
    #[inline]
    pub fn queue_capacity_clamped(&self) -> usize {
        self.queue_capacity.max(1)
    }
}

impl Default for BusConfig {
    /// Default configuration:
    ///
    /// - `workers = 10`
    /// - `max_retries = 3`
    /// - `queue_capacity = 1000`
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            max_retries: DEFAULT_MAX_RETRIES,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = BusConfig::default();
        assert_eq!(cfg.workers, 10);
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.queue_capacity, 1000);
    }

    #[test]
    fn zero_values_are_clamped() {
        let cfg = BusConfig {
            workers: 0,
            max_retries: 0,
            queue_capacity: 0,
        };
        assert_eq!(cfg.workers_clamped(), 1);
        assert_eq!(cfg.queue_capacity_clamped(), 1);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: BusConfig = serde_json::from_str(r#"{ "max_retries": 0 }"#).unwrap();
        assert_eq!(cfg.max_retries, 0);
        assert_eq!(cfg.workers, DEFAULT_WORKERS);
        assert_eq!(cfg.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }
}
