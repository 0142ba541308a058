//! Advanced Driver Assistance System (ADAS)
//!
//! Blind-spot monitoring from a rear/side camera:
//! - Normalized vehicle detections with bbox-based distance estimates
//! - Point-in-polygon blind-spot region membership
//! - Threat scoring, alert gating and level bands
//! - Escalation when the driver is drowsy or distracted
//! - Detection loop with isolated alert handlers

pub mod config;
pub mod escalation;
pub mod frame;
pub mod monitor;
pub mod object;
pub mod region;
pub mod simulated;
pub mod threat;

pub use config::{BlindSpotConfig, ThreatWeights};
pub use escalation::{DriverStateProvider, EscalatedWarning, EscalationPolicy};
pub use frame::{CameraGuard, FrameSource, RoadFrame};
pub use monitor::{AlertHandler, BlindSpotMonitor, BlindSpotStatus, EscalationHandler};
pub use object::{BoundingBox, Detection, ObjectDetector, VehicleType};
pub use region::BlindSpotRegion;
pub use simulated::{ScriptedDetector, SimulatedDetector, SyntheticCamera};
pub use threat::{AlertType, FilterReason, ThreatAlert, ThreatAssessor, ThreatLevel};

use thiserror::Error;

/// ADAS error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdasError {
    #[error("Camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("Detection failed: {0}")]
    Detection(String),

    #[error("Invalid blind-spot region {name}: {reason}")]
    InvalidRegion { name: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),
}
