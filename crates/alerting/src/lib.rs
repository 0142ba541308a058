//! Alerting System
//!
//! Turns a smoothed driver-state distribution into a published driver
//! state: dominant state, alert level from confidence bands, and the
//! recommended actions for that (state, level) pair.

mod classifier;
mod policy;
mod state;

pub use classifier::{AlertClassifier, AlertLevel, AlertThresholds};
pub use policy::{Action, ActionPolicy, DEFAULT_ACTIONS};
pub use state::{DriverState, PrimaryState};

use thiserror::Error;

/// Alerting error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AlertError {
    #[error("Invalid alert thresholds: {0}")]
    InvalidThresholds(String),
}
