//! Event Fusion Engine
//!
//! Combines the latest driver-state scores from each modality:
//! - Visual (cabin camera)
//! - Audio (cabin microphone)
//! - Driving (vehicle telemetry)
//!
//! Fusion is a reliability-weighted convex combination; when the camera
//! cannot see the driver a degraded preset shifts trust to driving
//! behaviour. Fused results are then smoothed over a short window so a
//! single noisy frame cannot flip the estimate.

mod config;
mod engine;
mod smoother;
mod weights;

pub use config::FusionConfig;
pub use engine::{FusedSnapshot, FusionEngine};
pub use smoother::{SlidingWindow, TemporalSmoother, DEFAULT_WINDOW};
pub use weights::{ReliabilityWeights, WeightPreset, WeightPresets};

use thiserror::Error;

/// Fusion error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FusionError {
    #[error("Invalid reliability weights: {0}")]
    InvalidWeights(String),

    #[error("Invalid smoothing window capacity: {0}")]
    InvalidWindow(usize),
}
