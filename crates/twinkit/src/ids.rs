//! Prefix-formatted monotonic identifiers.
//!
//! Every store and every dispatcher owns its own sequence, so two twins in
//! the same process never share a counter.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counter value a fresh (or reset) sequence starts from.
const FIRST_ID: u64 = 1;

/// Monotonic ID generator producing `prefix_000001`, `prefix_000002`, ...
///
/// Counters beyond 999999 keep growing (`prefix_1000000`) instead of wrapping.
#[derive(Debug)]
pub struct IdSequence {
    prefix: String,
    next: AtomicU64,
}

impl IdSequence {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(FIRST_ID),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Issue the next identifier.
    pub fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        format_id(&self.prefix, n)
    }

    /// Rewind to the first identifier.
    ///
    /// Uses the same `SeqCst` ordering as `next_id`: any call ordered after
    /// the reset observes the rewound counter.
    pub fn reset(&self) {
        self.next.store(FIRST_ID, Ordering::SeqCst);
    }

    /// Make sure the counter is past `n`, so `prefix_n` is never issued again.
    pub fn advance_past(&self, n: u64) {
        self.next.fetch_max(n.saturating_add(1), Ordering::SeqCst);
    }

    /// Numeric part of an ID this sequence could have issued.
    pub fn parse(&self, id: &str) -> Option<u64> {
        id.strip_prefix(self.prefix.as_str())?
            .strip_prefix('_')?
            .parse()
            .ok()
    }
}

pub fn format_id(prefix: &str, n: u64) -> String {
    format!("{prefix}_{n:06}")
}
