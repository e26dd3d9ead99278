//! # Subscription registry.
//!
//! Owns two indexes behind one reader/writer lock:
//!
//! ```text
//! subs:     SubscriptionId ──► { pattern, handler }
//! patterns: pattern        ──► { seq, [SubscriptionId, ...] }   (insertion order)
//! ```
//!
//! ## Rules
//! - Every id in `patterns` has an entry in `subs` and vice versa.
//! - A pattern entry is removed as soon as its id list becomes empty.
//! - Lookups return handlers ordered by pattern registration (`seq`), then by
//!   subscription order within a pattern. Each subscription appears once.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::error::BusError;
use crate::handlers::HandlerRef;
use crate::message::Payload;
use crate::pattern;

use super::SubscriptionId;

struct Entry<P: Payload> {
    pattern: String,
    handler: HandlerRef<P>,
}

struct PatternEntry {
    /// Registration sequence of the pattern; fixes cross-pattern handler order.
    seq: u64,
    ids: Vec<SubscriptionId>,
}

struct Inner<P: Payload> {
    subs: HashMap<SubscriptionId, Entry<P>>,
    patterns: HashMap<String, PatternEntry>,
    next_seq: u64,
}

/// Thread-safe pattern/handler index.
pub struct Registry<P: Payload> {
    inner: RwLock<Inner<P>>,
}

impl<P: Payload> Registry<P> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                subs: HashMap::new(),
                patterns: HashMap::new(),
                next_seq: 0,
            }),
        }
    }

    /// Registers `handler` under `pattern` and returns the new id.
    ///
    /// # Errors
    /// - [`BusError::InvalidPattern`] if `pattern` is empty;
    /// - [`BusError::InvalidHandler`] if `handler` is `None`.
    pub fn add(&self, pattern: &str, handler: Option<HandlerRef<P>>) -> Result<SubscriptionId, BusError> {
        if pattern.is_empty() {
            return Err(BusError::InvalidPattern);
        }
        let handler = handler.ok_or(BusError::InvalidHandler)?;

        let id = SubscriptionId::new();
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let inner = &mut *guard;
        let seq = inner.next_seq;
        let entry = inner
            .patterns
            .entry(pattern.to_owned())
            .or_insert_with(|| PatternEntry { seq, ids: Vec::new() });
        if entry.ids.is_empty() {
            inner.next_seq += 1;
        }
        entry.ids.push(id);
        inner.subs.insert(
            id,
            Entry {
                pattern: pattern.to_owned(),
                handler,
            },
        );
        Ok(id)
    }

    /// Removes a subscription and returns the pattern it was registered under.
    ///
    /// # Errors
    /// [`BusError::NotFound`] if `id` is unknown.
    pub fn remove(&self, id: SubscriptionId) -> Result<String, BusError> {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let inner = &mut *guard;
        let entry = inner.subs.remove(&id).ok_or(BusError::NotFound { id })?;

        if let Some(pe) = inner.patterns.get_mut(&entry.pattern) {
            pe.ids.retain(|x| *x != id);
            if pe.ids.is_empty() {
                inner.patterns.remove(&entry.pattern);
            }
        }
        Ok(entry.pattern)
    }

    /// Returns the handlers whose pattern matches `topic`, in registration order.
    ///
    /// No match yields an empty vector.
    pub fn handlers_for(&self, topic: &str) -> Vec<HandlerRef<P>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());

        let mut matched: Vec<&PatternEntry> = inner
            .patterns
            .iter()
            .filter(|(p, _)| pattern::matches(p, topic))
            .map(|(_, pe)| pe)
            .collect();
        matched.sort_by_key(|pe| pe.seq);

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for id in matched.into_iter().flat_map(|pe| pe.ids.iter()) {
            if !seen.insert(*id) {
                continue;
            }
            if let Some(entry) = inner.subs.get(id) {
                out.push(entry.handler.clone());
            }
        }
        out
    }

    /// Number of live subscriptions.
    pub fn count(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).subs.len()
    }

    /// Drops every subscription.
    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.subs.clear();
        inner.patterns.clear();
    }

    #[cfg(test)]
    fn pattern_count(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).patterns.len()
    }
}

impl<P: Payload> Default for Registry<P> {
    fn default() -> Self {
        Self::new()
    }
}
