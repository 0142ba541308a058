//! Bounded Queues
//!
//! Fixed-capacity FIFO storage shared between one writer and many readers.
//! The overflow policy decides what happens when a push arrives at capacity:
//! the incoming item is discarded (capture must never stall) or the oldest
//! item is evicted (latest-wins snapshots).

mod buffer;

pub use buffer::RingBuffer;

use serde::{Deserialize, Serialize};

/// What a full buffer does with a new item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Keep the stored items, discard the incoming one
    DropNewest,
    /// Evict the oldest stored item to make room
    DropOldest,
}

/// Outcome of a push
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome<T> {
    /// Item stored, nothing lost
    Stored,
    /// Item stored after evicting the returned oldest item
    Evicted(T),
    /// Buffer full, the incoming item was returned unstored
    Rejected(T),
}

impl<T> PushOutcome<T> {
    /// Whether anything was dropped by this push
    pub fn dropped(&self) -> bool {
        !matches!(self, PushOutcome::Stored)
    }
}
