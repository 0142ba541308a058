//! Driving-behaviour scorer configuration

use serde::{Deserialize, Serialize};

/// Driving-behaviour scorer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DrivingScorerConfig {
    /// Steering variance above which the driver is oversteering
    pub steering_threshold: f64,

    /// Steering variance below which there is effectively no steering input
    pub no_steering_threshold: f64,

    /// Lane position standard deviation above which the vehicle is weaving
    pub lane_deviation_threshold: f64,

    /// Speed variance (km/h²) above which speed is inconsistent
    pub speed_variance_threshold: f64,

    /// Speed variance that maps to a full speed score
    pub speed_variance_scale: f64,

    /// History lengths (samples)
    pub steering_window: usize,
    pub speed_window: usize,
    pub lane_window: usize,

    /// Samples required before scores are produced
    pub min_samples: usize,
}

impl Default for DrivingScorerConfig {
    fn default() -> Self {
        Self {
            steering_threshold: 0.3,
            no_steering_threshold: 0.01,
            lane_deviation_threshold: 0.4,
            speed_variance_threshold: 10.0,
            speed_variance_scale: 20.0,
            steering_window: 50,
            speed_window: 30,
            lane_window: 40,
            min_samples: 10,
        }
    }
}

impl DrivingScorerConfig {
    /// Create strict config (lower thresholds)
    pub fn strict() -> Self {
        Self {
            steering_threshold: 0.2,
            lane_deviation_threshold: 0.3,
            speed_variance_threshold: 7.0,
            ..Default::default()
        }
    }

    /// Create lenient config (higher thresholds)
    pub fn lenient() -> Self {
        Self {
            steering_threshold: 0.4,
            lane_deviation_threshold: 0.5,
            speed_variance_threshold: 15.0,
            ..Default::default()
        }
    }
}
