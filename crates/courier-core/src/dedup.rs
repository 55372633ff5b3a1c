//! Message deduplication.
//!
//! The same logical message may be pushed through several redundant
//! channels. The deduplicator remembers every `sendId` it has let through so
//! later copies can be dropped.
//!
//! The set is bounded: once `capacity` ids are held, the oldest is forgotten
//! for each new one. A capacity of zero keeps every id for the lifetime of
//! the client.

use courier_protocol::SendId;
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, PoisonError};
use tracing::trace;

/// Default number of remembered delivery ids.
pub const DEFAULT_DEDUP_CAPACITY: usize = 10_000;

#[derive(Debug, Default)]
struct Delivered {
    ids: HashSet<SendId>,
    order: VecDeque<SendId>,
}

/// Set of already-forwarded delivery ids.
#[derive(Debug)]
pub struct Deduplicator {
    capacity: usize,
    delivered: Mutex<Delivered>,
}

impl Deduplicator {
    /// Create a deduplicator with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_DEDUP_CAPACITY)
    }

    /// Create a deduplicator remembering at most `capacity` ids (0 = unbounded).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            delivered: Mutex::new(Delivered::default()),
        }
    }

    /// Record a delivery id.
    ///
    /// Returns `true` if this is the first time the id is seen, in which case
    /// the caller owns forwarding the message. Check and insert are a single
    /// step, so two concurrent copies cannot both win.
    pub fn insert(&self, send_id: &str) -> bool {
        let mut delivered = self
            .delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if !delivered.ids.insert(send_id.to_string()) {
            return false;
        }
        delivered.order.push_back(send_id.to_string());

        if self.capacity > 0 {
            while delivered.order.len() > self.capacity {
                if let Some(evicted) = delivered.order.pop_front() {
                    delivered.ids.remove(&evicted);
                    trace!(send_id = %evicted, "Evicted delivery id");
                }
            }
        }

        true
    }

    /// Check if a delivery id has been seen.
    #[must_use]
    pub fn contains(&self, send_id: &str) -> bool {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .ids
            .contains(send_id)
    }

    /// Number of remembered ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .ids
            .len()
    }

    /// Check if no id is remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of remembered ids (0 = unbounded).
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_first_insert_wins() {
        let dedup = Deduplicator::new();
        assert!(dedup.insert("dup1"));
        assert!(!dedup.insert("dup1"));
        assert!(dedup.contains("dup1"));
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let dedup = Deduplicator::with_capacity(2);
        assert!(dedup.insert("a"));
        assert!(dedup.insert("b"));
        assert!(dedup.insert("c"));

        assert_eq!(dedup.len(), 2);
        assert!(!dedup.contains("a"));
        assert!(dedup.contains("b"));
        assert!(dedup.contains("c"));

        // An evicted id is treated as new again
        assert!(dedup.insert("a"));
    }

    #[test]
    fn test_unbounded() {
        let dedup = Deduplicator::with_capacity(0);
        for i in 0..1_000 {
            assert!(dedup.insert(&format!("id-{i}")));
        }
        assert_eq!(dedup.len(), 1_000);
        assert_eq!(dedup.capacity(), 0);
    }

    #[test]
    fn test_concurrent_copies_forward_once() {
        let dedup = Arc::new(Deduplicator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let dedup = Arc::clone(&dedup);
                std::thread::spawn(move || dedup.insert("same"))
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
