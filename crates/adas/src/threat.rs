//! Per-detection threat scoring and alert gating

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::BlindSpotConfig;
use crate::object::{unit_or, Detection, VehicleType};

/// Threat level band
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreatLevel {
    Low,
    Medium,
    High,
}

impl ThreatLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            ThreatLevel::Low => "LOW",
            ThreatLevel::Medium => "MEDIUM",
            ThreatLevel::High => "HIGH",
        }
    }

    pub fn alert_type(self) -> AlertType {
        match self {
            ThreatLevel::High => AlertType::ImmediateAction,
            ThreatLevel::Medium => AlertType::Warning,
            ThreatLevel::Low => AlertType::Informational,
        }
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed alert tag per level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    ImmediateAction,
    Warning,
    Informational,
}

impl AlertType {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertType::ImmediateAction => "IMMEDIATE_ACTION",
            AlertType::Warning => "WARNING",
            AlertType::Informational => "INFORMATIONAL",
        }
    }
}

/// Why a detection did not raise an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterReason {
    OutsideBlindSpot,
    LowConfidence,
    TooFar,
    TooSmall,
}

impl FilterReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FilterReason::OutsideBlindSpot => "outside_blind_spot",
            FilterReason::LowConfidence => "low_confidence",
            FilterReason::TooFar => "too_far",
            FilterReason::TooSmall => "too_small",
        }
    }
}

/// Alert raised for one detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatAlert {
    pub timestamp_ms: u64,
    pub vehicle_type: VehicleType,
    pub region: Option<String>,
    pub distance: f64,
    pub confidence: f64,
    pub threat_score: f64,
    pub level: ThreatLevel,
    pub alert_type: AlertType,
    pub message: String,
}

impl ThreatAlert {
    pub fn is_high(&self) -> bool {
        self.level == ThreatLevel::High
    }
}

/// Scores detections and decides which merit an alert
#[derive(Debug, Clone, Default)]
pub struct ThreatAssessor {
    config: BlindSpotConfig,
}

impl ThreatAssessor {
    pub fn new(config: BlindSpotConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BlindSpotConfig {
        &self.config
    }

    /// Weighted threat score in [0,1]
    pub fn score(&self, detection: &Detection) -> f64 {
        let w = &self.config.weights;
        let closeness = 1.0 - unit_or(detection.distance, 1.0);
        let confidence = unit_or(detection.confidence, 0.0);
        let size = unit_or(detection.bbox.area() * self.config.size_scale, 0.0);
        let presence = if detection.in_blind_spot() {
            1.0
        } else {
            self.config.outside_region_factor
        };

        let score = w.distance * closeness
            + w.confidence * confidence
            + w.size * size
            + w.vehicle_type * detection.vehicle_type.severity()
            + w.blind_spot * presence;

        score.clamp(0.0, 1.0)
    }

    /// First gate the detection fails, if any. NaN fails its gate.
    pub fn filter_reason(&self, detection: &Detection) -> Option<FilterReason> {
        let cfg = &self.config;
        if !detection.in_blind_spot() {
            Some(FilterReason::OutsideBlindSpot)
        } else if below(detection.confidence, cfg.detection_threshold) {
            Some(FilterReason::LowConfidence)
        } else if detection.distance.is_nan() || detection.distance > cfg.proximity_threshold {
            Some(FilterReason::TooFar)
        } else if below(detection.bbox.area(), cfg.min_vehicle_size) {
            Some(FilterReason::TooSmall)
        } else {
            None
        }
    }

    /// All four gates must pass
    pub fn should_alert(&self, detection: &Detection) -> bool {
        self.filter_reason(detection).is_none()
    }

    pub fn level_for(&self, score: f64) -> ThreatLevel {
        if score > self.config.high_threshold {
            ThreatLevel::High
        } else if score > self.config.medium_threshold {
            ThreatLevel::Medium
        } else {
            ThreatLevel::Low
        }
    }

    /// Build the alert for a scored detection
    pub fn to_alert(&self, detection: &Detection, score: f64, timestamp_ms: u64) -> ThreatAlert {
        let level = self.level_for(score);
        ThreatAlert {
            timestamp_ms,
            vehicle_type: detection.vehicle_type,
            region: detection.region.clone(),
            distance: detection.distance,
            confidence: detection.confidence,
            threat_score: score,
            level,
            alert_type: level.alert_type(),
            message: alert_message(detection, level),
        }
    }
}

fn below(value: f64, threshold: f64) -> bool {
    value.is_nan() || value < threshold
}

fn alert_message(detection: &Detection, level: ThreatLevel) -> String {
    let vehicle = detection.vehicle_type.as_str().to_uppercase();
    let region = detection
        .region
        .as_deref()
        .map(str::to_uppercase)
        .unwrap_or_else(|| "UNKNOWN".to_string());

    match level {
        ThreatLevel::High => format!("{vehicle} IN {region} BLIND SPOT! CHECK MIRROR!"),
        ThreatLevel::Medium => format!("{vehicle} approaching {region} blind spot"),
        ThreatLevel::Low => format!("{vehicle} detected in vicinity"),
    }
}
