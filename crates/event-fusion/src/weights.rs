//! Modality reliability weights

use dms::Modality;
use serde::{Deserialize, Serialize};

use crate::FusionError;

const WEIGHT_EPSILON: f64 = 1e-6;

/// Per-modality trust, summing to 1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityWeights {
    pub visual: f64,
    pub audio: f64,
    pub driving: f64,
}

impl ReliabilityWeights {
    /// Create validated weights
    pub fn new(visual: f64, audio: f64, driving: f64) -> Result<Self, FusionError> {
        let weights = Self {
            visual,
            audio,
            driving,
        };
        weights.validate()?;
        Ok(weights)
    }

    /// Balanced weights used while the camera sees the driver
    pub const fn balanced() -> Self {
        Self {
            visual: 0.5,
            audio: 0.2,
            driving: 0.3,
        }
    }

    /// Weights used when no face is detected
    pub const fn visual_degraded() -> Self {
        Self {
            visual: 0.1,
            audio: 0.2,
            driving: 0.7,
        }
    }

    /// Weight for a modality (blind-spot does not take part in fusion)
    pub fn weight(&self, modality: Modality) -> f64 {
        match modality {
            Modality::Visual => self.visual,
            Modality::Audio => self.audio,
            Modality::Driving => self.driving,
            Modality::BlindSpot => 0.0,
        }
    }

    /// Check weights are finite, non-negative and sum to 1
    pub fn validate(&self) -> Result<(), FusionError> {
        let all = [self.visual, self.audio, self.driving];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(FusionError::InvalidWeights(format!(
                "weights must be non-negative: {:?}",
                self
            )));
        }
        let total: f64 = all.iter().sum();
        if (total - 1.0).abs() > WEIGHT_EPSILON {
            return Err(FusionError::InvalidWeights(format!(
                "weights sum to {:.6}, expected 1.0",
                total
            )));
        }
        Ok(())
    }
}

/// Which preset a fusion cycle used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightPreset {
    Default,
    VisualDegraded,
}

/// The two weight presets
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightPresets {
    /// Used when the visual modality is available
    pub default: ReliabilityWeights,
    /// Used when the visual modality is unavailable
    pub visual_degraded: ReliabilityWeights,
}

impl Default for WeightPresets {
    fn default() -> Self {
        Self {
            default: ReliabilityWeights::balanced(),
            visual_degraded: ReliabilityWeights::visual_degraded(),
        }
    }
}

impl WeightPresets {
    /// Validate both presets
    pub fn validate(&self) -> Result<(), FusionError> {
        self.default.validate()?;
        self.visual_degraded.validate()
    }

    /// Weights for a preset
    pub fn get(&self, preset: WeightPreset) -> &ReliabilityWeights {
        match preset {
            WeightPreset::Default => &self.default,
            WeightPreset::VisualDegraded => &self.visual_degraded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        assert!(WeightPresets::default().validate().is_ok());
        assert_eq!(ReliabilityWeights::balanced().weight(Modality::Visual), 0.5);
        assert_eq!(ReliabilityWeights::visual_degraded().weight(Modality::Driving), 0.7);
        assert_eq!(ReliabilityWeights::balanced().weight(Modality::BlindSpot), 0.0);
    }

    #[test]
    fn test_rejects_bad_weights() {
        assert!(ReliabilityWeights::new(0.5, 0.5, 0.5).is_err());
        assert!(ReliabilityWeights::new(1.2, -0.2, 0.0).is_err());
        assert!(ReliabilityWeights::new(f64::NAN, 0.5, 0.5).is_err());
        assert!(ReliabilityWeights::new(0.6, 0.1, 0.3).is_ok());
    }
}
