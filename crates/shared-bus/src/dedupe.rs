//! # Idempotent Consumption
//!
//! Delivery from the outbox is at-least-once, so a consumer can see the same
//! key twice (a crash between publish and mark-published replays the entry).
//! `IdempotentConsumer` remembers a bounded window of recently seen keys.

use std::collections::{HashSet, VecDeque};

/// Bounded memory of processed message keys.
///
/// When full, the oldest key is forgotten first.
#[derive(Debug)]
pub struct IdempotentConsumer {
    seen: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
    duplicates: u64,
}

impl IdempotentConsumer {
    /// Default number of keys remembered.
    pub const DEFAULT_CAPACITY: usize = 10_000;

    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            seen: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
            duplicates: 0,
        }
    }

    /// Record `key`. Returns true the first time a key is seen and false for
    /// every repeat still inside the window.
    pub fn first_delivery(&mut self, key: &str) -> bool {
        if self.seen.contains(key) {
            self.duplicates += 1;
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(key.to_string());
        self.order.push_back(key.to_string());
        true
    }

    /// Repeats dropped so far.
    #[must_use]
    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for IdempotentConsumer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat_is_rejected() {
        let mut consumer = IdempotentConsumer::new();
        assert!(consumer.first_delivery("42"));
        assert!(!consumer.first_delivery("42"));
        assert_eq!(consumer.duplicates(), 1);
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut consumer = IdempotentConsumer::with_capacity(2);
        assert!(consumer.first_delivery("a"));
        assert!(consumer.first_delivery("b"));
        assert!(consumer.first_delivery("c"));
        assert_eq!(consumer.len(), 2);
        // "a" fell out of the window
        assert!(consumer.first_delivery("a"));
        assert!(!consumer.first_delivery("c"));
    }
}
