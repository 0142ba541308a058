//! Fusion configuration

use serde::{Deserialize, Serialize};

use crate::smoother::DEFAULT_WINDOW;
use crate::weights::WeightPresets;
use crate::FusionError;

/// Fusion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Reliability weight presets
    pub weights: WeightPresets,

    /// Smoothing window capacity (fused snapshots)
    pub window_capacity: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            weights: WeightPresets::default(),
            window_capacity: DEFAULT_WINDOW,
        }
    }
}

impl FusionConfig {
    /// Validate weights and window size
    pub fn validate(&self) -> Result<(), FusionError> {
        self.weights.validate()?;
        if self.window_capacity == 0 {
            return Err(FusionError::InvalidWindow(self.window_capacity));
        }
        Ok(())
    }
}
