//! Temporal smoothing of fused snapshots

use dms::{DriverStateKind, StateDistribution, STATE_COUNT};
use std::collections::VecDeque;
use tracing::debug;

use crate::engine::FusedSnapshot;
use crate::FusionError;

/// Default smoothing window (fused snapshots)
pub const DEFAULT_WINDOW: usize = 15;

/// Sliding window for any data type
#[derive(Debug, Clone)]
pub struct SlidingWindow<T> {
    data: VecDeque<T>,
    capacity: usize,
}

impl<T> SlidingWindow<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, item: T) {
        if self.data.len() >= self.capacity {
            self.data.pop_front();
        }
        self.data.push_back(item);
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.data.iter()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}

/// Exponentially recency-weighted average over the last fused snapshots.
///
/// Position `i` of `n` (0 = oldest) gets weight `exp(-1 + i/(n-1))`,
/// normalized over the window, so the newest snapshot counts `e` times
/// as much as the oldest.
#[derive(Debug, Clone)]
pub struct TemporalSmoother {
    window: SlidingWindow<StateDistribution>,
}

impl TemporalSmoother {
    /// Create a smoother with the given window capacity
    pub fn new(capacity: usize) -> Result<Self, FusionError> {
        if capacity == 0 {
            return Err(FusionError::InvalidWindow(capacity));
        }
        Ok(Self {
            window: SlidingWindow::new(capacity),
        })
    }

    /// Append a fused snapshot and return the smoothed estimate.
    /// Snapshots with no scores leave the window untouched.
    pub fn push(&mut self, fused: FusedSnapshot) -> StateDistribution {
        if fused.distribution.is_empty() {
            debug!("Skipping empty fused snapshot");
        } else {
            self.window.push(fused.distribution);
        }
        self.current()
    }

    /// Smoothed estimate of the current window (empty before any data)
    pub fn current(&self) -> StateDistribution {
        let n = self.window.len();
        if n == 0 {
            return StateDistribution::empty();
        }

        let weights = recency_weights(n);
        let mut smoothed = [0.0; STATE_COUNT];
        for (dist, weight) in self.window.iter().zip(&weights) {
            for kind in DriverStateKind::ALL {
                smoothed[kind.index()] += weight * dist.get(kind);
            }
        }
        StateDistribution::from_scores(smoothed)
    }

    /// Number of snapshots in the window
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// Check if the window is empty
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Window capacity
    pub fn capacity(&self) -> usize {
        self.window.capacity()
    }

    /// Forget all history (on driver change)
    pub fn reset(&mut self) {
        self.window.clear();
    }
}

impl Default for TemporalSmoother {
    fn default() -> Self {
        Self {
            window: SlidingWindow::new(DEFAULT_WINDOW),
        }
    }
}

/// Normalized weights for `n` positions, oldest first
fn recency_weights(n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![1.0];
    }
    let last = (n - 1) as f64;
    let raw: Vec<f64> = (0..n)
        .map(|i| (-1.0 + i as f64 / last).exp())
        .collect();
    let total: f64 = raw.iter().sum();
    raw.into_iter().map(|w| w / total).collect()
}
