//! Ring Buffer Implementation

use crate::{OverflowPolicy, PushOutcome};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Bounded FIFO buffer with a fixed overflow policy
pub struct RingBuffer<T> {
    /// Stored items, oldest at the front
    storage: Mutex<VecDeque<T>>,
    /// Capacity of the buffer
    capacity: usize,
    /// Overflow behaviour
    policy: OverflowPolicy,
    /// Total items accepted (for statistics)
    total_written: AtomicUsize,
    /// Total items lost to overflow
    dropped: AtomicUsize,
}

impl<T> RingBuffer<T> {
    /// Create a new buffer. A zero capacity is raised to one.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            storage: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            policy,
            total_written: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
        }
    }

    /// Buffer that keeps what it has and rejects new items when full
    pub fn drop_newest(capacity: usize) -> Self {
        Self::new(capacity, OverflowPolicy::DropNewest)
    }

    /// Buffer that evicts its oldest item when full
    pub fn drop_oldest(capacity: usize) -> Self {
        Self::new(capacity, OverflowPolicy::DropOldest)
    }

    /// Push an item, applying the overflow policy if full
    pub fn push(&self, item: T) -> PushOutcome<T> {
        let mut storage = self.storage.lock();

        let outcome = if storage.len() < self.capacity {
            storage.push_back(item);
            PushOutcome::Stored
        } else {
            match self.policy {
                OverflowPolicy::DropNewest => PushOutcome::Rejected(item),
                OverflowPolicy::DropOldest => {
                    let evicted = storage.pop_front();
                    storage.push_back(item);
                    match evicted {
                        Some(old) => PushOutcome::Evicted(old),
                        None => PushOutcome::Stored,
                    }
                }
            }
        };

        if outcome.dropped() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        if !matches!(outcome, PushOutcome::Rejected(_)) {
            self.total_written.fetch_add(1, Ordering::Relaxed);
        }
        outcome
    }

    /// Remove and return the oldest item
    pub fn pop(&self) -> Option<T> {
        self.storage.lock().pop_front()
    }

    /// Remove and return every stored item, oldest first
    pub fn drain(&self) -> Vec<T> {
        self.storage.lock().drain(..).collect()
    }

    /// Get the number of items currently in the buffer
    pub fn len(&self) -> usize {
        self.storage.lock().len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if buffer is full
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Get the buffer capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the overflow policy
    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Get fill ratio (0.0 to 1.0)
    pub fn fill_ratio(&self) -> f64 {
        self.len() as f64 / self.capacity as f64
    }

    /// Get total items accepted (for statistics)
    pub fn total_written(&self) -> usize {
        self.total_written.load(Ordering::Relaxed)
    }

    /// Get total items lost to overflow
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Clear the buffer
    pub fn clear(&self) {
        self.storage.lock().clear();
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Read the last N items (most recent first) without removing them
    pub fn read_last(&self, count: usize) -> Vec<T> {
        self.storage.lock().iter().rev().take(count).cloned().collect()
    }

    /// Clone of the newest item
    pub fn latest(&self) -> Option<T> {
        self.storage.lock().back().cloned()
    }

    /// Clone of every stored item, oldest first
    pub fn snapshot(&self) -> Vec<T> {
        self.storage.lock().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_push_and_read() {
        let buffer = RingBuffer::drop_oldest(10);

        for i in 0..5u32 {
            buffer.push(i * 100);
        }

        assert_eq!(buffer.len(), 5);

        let items = buffer.read_last(3);
        assert_eq!(items, vec![400, 300, 200]); // Most recent first
    }

    #[test]
    fn test_drop_oldest_evicts_front() {
        let buffer = RingBuffer::drop_oldest(3);
        buffer.push(1);
        buffer.push(2);
        buffer.push(3);

        assert_eq!(buffer.push(4), PushOutcome::Evicted(1));
        assert_eq!(buffer.snapshot(), vec![2, 3, 4]);
        assert_eq!(buffer.dropped(), 1);
        assert_eq!(buffer.latest(), Some(4));
    }

    #[test]
    fn test_drop_newest_keeps_contents() {
        let buffer = RingBuffer::drop_newest(2);
        buffer.push("a");
        buffer.push("b");

        assert_eq!(buffer.push("c"), PushOutcome::Rejected("c"));
        assert_eq!(buffer.snapshot(), vec!["a", "b"]);
        assert_eq!(buffer.total_written(), 2);
        assert_eq!(buffer.dropped(), 1);
    }

    #[test]
    fn test_pop_is_fifo() {
        let buffer = RingBuffer::drop_newest(4);
        buffer.push(7);
        buffer.push(8);
        assert_eq!(buffer.pop(), Some(7));
        assert_eq!(buffer.pop(), Some(8));
        assert_eq!(buffer.pop(), None);
    }

    #[test]
    fn test_fill_ratio() {
        let buffer = RingBuffer::drop_oldest(100);
        assert_eq!(buffer.fill_ratio(), 0.0);

        for i in 0..50 {
            buffer.push(i);
        }

        assert!((buffer.fill_ratio() - 0.5).abs() < 0.01);
        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let buffer = RingBuffer::drop_oldest(0);
        assert_eq!(buffer.capacity(), 1);
        buffer.push(1);
        assert!(buffer.is_full());
    }

    proptest! {
        #[test]
        fn prop_never_exceeds_capacity(capacity in 1usize..20, pushes in 0usize..100) {
            let buffer = RingBuffer::drop_oldest(capacity);
            for i in 0..pushes {
                buffer.push(i);
            }
            prop_assert_eq!(buffer.len(), pushes.min(capacity));
            prop_assert_eq!(buffer.dropped(), pushes.saturating_sub(capacity));
            // newest `capacity` items survive, in insertion order
            let expected: Vec<usize> = (pushes.saturating_sub(capacity)..pushes).collect();
            prop_assert_eq!(buffer.snapshot(), expected);
        }
    }
}
