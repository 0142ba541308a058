//! Driver Monitoring System (DMS)
//!
//! Driver state model shared by every modality:
//! - Fixed driver-state enumeration and normalized score distributions
//! - Per-modality snapshots (visual, audio, driving, blind-spot)
//! - The score source contract producers are driven through
//! - Driving-behaviour scoring from vehicle telemetry

pub mod config;
pub mod driving;
pub mod snapshot;
pub mod source;
pub mod state;

pub use config::DrivingScorerConfig;
pub use driving::{DrivingBehaviorScorer, DrivingHistory, SimulatedDrivingSource, TelemetrySample};
pub use snapshot::{now_ms, Modality, ModalitySnapshot};
pub use source::{ModalityScoreSource, ScriptStep, ScriptedSource, SimulatedSource, SourceGuard};
pub use state::{DriverStateKind, StateDistribution, STATE_COUNT, SUM_EPSILON};

use thiserror::Error;

/// DMS error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DmsError {
    #[error("Unknown driver state: {0}")]
    UnknownState(String),

    #[error("Malformed distribution: {0}")]
    MalformedDistribution(String),

    #[error("{modality} source failed: {reason}")]
    SourceFailure { modality: Modality, reason: String },

    #[error("{modality} source unavailable: {reason}")]
    SourceUnavailable { modality: Modality, reason: String },
}
