//! Blind-spot monitor configuration

use serde::{Deserialize, Serialize};

use crate::region::BlindSpotRegion;
use crate::AdasError;

/// Weights of the threat score components
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreatWeights {
    pub distance: f64,
    pub confidence: f64,
    pub size: f64,
    pub vehicle_type: f64,
    pub blind_spot: f64,
}

impl Default for ThreatWeights {
    fn default() -> Self {
        Self {
            distance: 0.4,
            confidence: 0.2,
            size: 0.2,
            vehicle_type: 0.1,
            blind_spot: 0.1,
        }
    }
}

impl ThreatWeights {
    pub fn total(&self) -> f64 {
        self.distance + self.confidence + self.size + self.vehicle_type + self.blind_spot
    }

    /// Weights must be non-negative and sum to 1 so scores stay in [0,1]
    pub fn validate(&self) -> Result<(), AdasError> {
        let all = [self.distance, self.confidence, self.size, self.vehicle_type, self.blind_spot];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(AdasError::Config(format!("negative threat weight in {:?}", self)));
        }
        if (self.total() - 1.0).abs() > 1e-6 {
            return Err(AdasError::Config(format!(
                "threat weights sum to {:.3}, expected 1.0",
                self.total()
            )));
        }
        Ok(())
    }
}

/// Blind-spot monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlindSpotConfig {
    /// Minimum detector confidence to alert (and pre-filter)
    pub detection_threshold: f64,

    /// Maximum estimated distance to alert
    pub proximity_threshold: f64,

    /// Minimum normalized bbox area to alert
    pub min_vehicle_size: f64,

    /// Score above which an alert is HIGH
    pub high_threshold: f64,

    /// Score above which an alert is MEDIUM
    pub medium_threshold: f64,

    /// Presence factor for detections outside every region
    pub outside_region_factor: f64,

    /// Area multiplier for the size factor (capped at 1)
    pub size_scale: f64,

    pub weights: ThreatWeights,

    /// Run detection on every n-th frame
    pub frame_skip: u32,

    /// Pause between loop iterations (ms)
    pub loop_delay_ms: u64,

    /// Number of recent alerts kept for status queries
    pub history_capacity: usize,

    /// Regions tested in order; first match wins
    pub regions: Vec<BlindSpotRegion>,
}

impl Default for BlindSpotConfig {
    fn default() -> Self {
        Self {
            detection_threshold: 0.5,
            proximity_threshold: 0.3,
            min_vehicle_size: 0.02,
            high_threshold: 0.7,
            medium_threshold: 0.4,
            outside_region_factor: 0.3,
            size_scale: 10.0,
            weights: ThreatWeights::default(),
            frame_skip: 2,
            loop_delay_ms: 10,
            history_capacity: 10,
            regions: BlindSpotRegion::defaults(),
        }
    }
}

impl BlindSpotConfig {
    /// Alert earlier: lower confidence, larger proximity window
    pub fn sensitive() -> Self {
        Self {
            detection_threshold: 0.4,
            proximity_threshold: 0.4,
            min_vehicle_size: 0.01,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), AdasError> {
        self.weights.validate()?;
        for (name, value) in [
            ("detection_threshold", self.detection_threshold),
            ("proximity_threshold", self.proximity_threshold),
            ("min_vehicle_size", self.min_vehicle_size),
            ("high_threshold", self.high_threshold),
            ("medium_threshold", self.medium_threshold),
            ("outside_region_factor", self.outside_region_factor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AdasError::Config(format!("{name} must be in [0,1], got {value}")));
            }
        }
        if self.medium_threshold > self.high_threshold {
            return Err(AdasError::Config(format!(
                "medium threshold {} above high threshold {}",
                self.medium_threshold, self.high_threshold
            )));
        }
        if self.size_scale <= 0.0 {
            return Err(AdasError::Config("size_scale must be positive".into()));
        }
        if self.frame_skip == 0 {
            return Err(AdasError::Config("frame_skip must be at least 1".into()));
        }
        for region in &self.regions {
            region.validate()?;
        }
        Ok(())
    }
}
