//! Driving-behaviour scoring from vehicle telemetry
//!
//! The scorer is a pure function of the current sample and a history object
//! the caller owns, so several vehicles (or tests) never share hidden state.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

use crate::config::DrivingScorerConfig;
use crate::snapshot::{Modality, ModalitySnapshot};
use crate::source::ModalityScoreSource;
use crate::state::{DriverStateKind, StateDistribution};
use crate::DmsError;

/// One telemetry sample from the CAN bus
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Steering angle (normalized, -1..1)
    pub steering_angle: f64,
    /// Vehicle speed (km/h)
    pub vehicle_speed: f64,
    /// Lateral position in lane (normalized, 0 = centered)
    pub lane_position: f64,
    /// Brake pressure (0..1)
    pub brake_pressure: f64,
    /// Longitudinal acceleration (g)
    pub acceleration: f64,
    /// Throttle position (0..1)
    pub throttle_position: f64,
    /// Yaw rate (rad/s)
    pub yaw_rate: f64,
}

impl TelemetrySample {
    /// Plausible random sample for simulation
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self {
            steering_angle: rng.gen_range(-0.5..0.5),
            vehicle_speed: rng.gen_range(0.0..120.0),
            lane_position: rng.gen_range(-0.3..0.3),
            brake_pressure: rng.gen_range(0.0..1.0),
            acceleration: rng.gen_range(-0.5..0.5),
            throttle_position: rng.gen_range(0.0..1.0),
            yaw_rate: rng.gen_range(-0.2..0.2),
        }
    }
}

/// Bounded telemetry history owned by the caller
#[derive(Debug, Clone)]
pub struct DrivingHistory {
    steering: VecDeque<f64>,
    speed: VecDeque<f64>,
    lane: VecDeque<f64>,
    steering_window: usize,
    speed_window: usize,
    lane_window: usize,
}

impl DrivingHistory {
    /// Create an empty history sized by the scorer config
    pub fn new(config: &DrivingScorerConfig) -> Self {
        Self {
            steering: VecDeque::with_capacity(config.steering_window),
            speed: VecDeque::with_capacity(config.speed_window),
            lane: VecDeque::with_capacity(config.lane_window),
            steering_window: config.steering_window.max(1),
            speed_window: config.speed_window.max(1),
            lane_window: config.lane_window.max(1),
        }
    }

    /// Record a sample, evicting the oldest values beyond each window
    pub fn push(&mut self, sample: &TelemetrySample) {
        push_bounded(&mut self.steering, sample.steering_angle, self.steering_window);
        push_bounded(&mut self.speed, sample.vehicle_speed, self.speed_window);
        push_bounded(&mut self.lane, sample.lane_position, self.lane_window);
    }

    /// Samples in the shortest window
    pub fn len(&self) -> usize {
        self.steering.len().min(self.speed.len()).min(self.lane.len())
    }

    /// Check if history is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reset (on driver change)
    pub fn clear(&mut self) {
        self.steering.clear();
        self.speed.clear();
        self.lane.clear();
    }
}

fn push_bounded(window: &mut VecDeque<f64>, value: f64, capacity: usize) {
    if window.len() >= capacity {
        window.pop_front();
    }
    window.push_back(value);
}

/// Population variance
fn variance(values: &VecDeque<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n
}

/// Steering pattern analysis
#[derive(Debug, Clone, Copy)]
pub struct SteeringAnalysis {
    pub variance: f64,
    pub oversteering: bool,
    pub no_steering: bool,
    pub score: f64,
}

/// Lane keeping analysis
#[derive(Debug, Clone, Copy)]
pub struct LaneAnalysis {
    pub deviation: f64,
    pub weaving: bool,
    pub score: f64,
}

/// Speed consistency analysis
#[derive(Debug, Clone, Copy)]
pub struct SpeedAnalysis {
    pub variance: f64,
    pub inconsistent: bool,
    pub score: f64,
}

/// Maps telemetry history to a driver-state distribution
#[derive(Debug, Clone, Default)]
pub struct DrivingBehaviorScorer {
    config: DrivingScorerConfig,
}

impl DrivingBehaviorScorer {
    /// Create a scorer
    pub fn new(config: DrivingScorerConfig) -> Self {
        Self { config }
    }

    /// Fresh history sized for this scorer
    pub fn history(&self) -> DrivingHistory {
        DrivingHistory::new(&self.config)
    }

    /// Record `sample` and score the updated history. `None` until enough
    /// samples have been seen.
    pub fn score(
        &self,
        sample: &TelemetrySample,
        history: &mut DrivingHistory,
    ) -> Option<StateDistribution> {
        history.push(sample);
        if history.len() < self.config.min_samples {
            return None;
        }

        let steering = self.analyze_steering(history);
        let lane = self.analyze_lane(history);
        let speed = self.analyze_speed(history);

        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        let attentive = (1.0 - (steering.score + lane.score + speed.score) / 3.0).max(0.0);

        let raw = StateDistribution::from_pairs([
            (DriverStateKind::Alert, attentive),
            (DriverStateKind::Drowsy, lane.score * 0.6 + steering.score * 0.4),
            (
                DriverStateKind::Distracted,
                flag(steering.no_steering) * 0.7 + lane.score * 0.3,
            ),
            (
                DriverStateKind::Angry,
                flag(steering.oversteering) * 0.8 + flag(speed.inconsistent) * 0.2,
            ),
            (DriverStateKind::Happy, 0.0),
            (
                DriverStateKind::Ill,
                flag(lane.weaving) * 0.5 + flag(steering.no_steering) * 0.5,
            ),
            (
                DriverStateKind::Unconscious,
                flag(steering.no_steering) * 0.8 + flag(lane.weaving) * 0.2,
            ),
            (DriverStateKind::Normal, attentive),
        ]);

        match raw.normalized() {
            Ok(distribution) => Some(distribution),
            Err(e) => {
                debug!("Driving scores discarded: {}", e);
                None
            }
        }
    }

    fn analyze_steering(&self, history: &DrivingHistory) -> SteeringAnalysis {
        let variance = variance(&history.steering);
        SteeringAnalysis {
            variance,
            oversteering: variance > self.config.steering_threshold,
            no_steering: variance < self.config.no_steering_threshold,
            score: (variance / self.config.steering_threshold).min(1.0),
        }
    }

    fn analyze_lane(&self, history: &DrivingHistory) -> LaneAnalysis {
        let deviation = variance(&history.lane).sqrt();
        LaneAnalysis {
            deviation,
            weaving: deviation > self.config.lane_deviation_threshold,
            score: (deviation / self.config.lane_deviation_threshold).min(1.0),
        }
    }

    fn analyze_speed(&self, history: &DrivingHistory) -> SpeedAnalysis {
        let variance = variance(&history.speed);
        SpeedAnalysis {
            variance,
            inconsistent: variance > self.config.speed_variance_threshold,
            score: (variance / self.config.speed_variance_scale).min(1.0),
        }
    }
}

/// Driving source fed by simulated CAN telemetry
pub struct SimulatedDrivingSource {
    rng: StdRng,
    scorer: DrivingBehaviorScorer,
    history: DrivingHistory,
}

impl SimulatedDrivingSource {
    /// Create a source seeded from entropy
    pub fn new(config: DrivingScorerConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Create a deterministic source
    pub fn seeded(config: DrivingScorerConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: DrivingScorerConfig, rng: StdRng) -> Self {
        let scorer = DrivingBehaviorScorer::new(config);
        let history = scorer.history();
        Self { rng, scorer, history }
    }
}

impl ModalityScoreSource for SimulatedDrivingSource {
    fn modality(&self) -> Modality {
        Modality::Driving
    }

    fn produce(&mut self) -> Result<Option<ModalitySnapshot>, DmsError> {
        let sample = TelemetrySample::random(&mut self.rng);
        Ok(self
            .scorer
            .score(&sample, &mut self.history)
            .map(|distribution| ModalitySnapshot::new(Modality::Driving, distribution)))
    }

    fn release(&mut self) {
        self.history.clear();
    }
}
