//! Alert Classifier Implementation

use dms::StateDistribution;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::policy::ActionPolicy;
use crate::state::{DriverState, PrimaryState};
use crate::AlertError;

/// Alert level, ordered by urgency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertLevel {
    Normal,
    Notice,
    Warning,
    Critical,
}

impl AlertLevel {
    /// All levels, least urgent first
    pub const ALL: [AlertLevel; 4] = [
        AlertLevel::Normal,
        AlertLevel::Notice,
        AlertLevel::Warning,
        AlertLevel::Critical,
    ];

    /// Get string representation
    pub fn as_str(self) -> &'static str {
        match self {
            AlertLevel::Normal => "NORMAL",
            AlertLevel::Notice => "NOTICE",
            AlertLevel::Warning => "WARNING",
            AlertLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confidence bands, evaluated highest first
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    /// Confidence at or above which the level is CRITICAL (default: 0.70)
    pub critical: f64,
    /// Confidence at or above which the level is WARNING (default: 0.50)
    pub warning: f64,
    /// Confidence at or above which the level is NOTICE (default: 0.30)
    pub notice: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            critical: 0.70,
            warning: 0.50,
            notice: 0.30,
        }
    }
}

impl AlertThresholds {
    /// Create strict thresholds (alerts earlier)
    pub fn strict() -> Self {
        Self {
            critical: 0.60,
            warning: 0.40,
            notice: 0.20,
        }
    }

    /// Create lenient thresholds (alerts later)
    pub fn lenient() -> Self {
        Self {
            critical: 0.80,
            warning: 0.60,
            notice: 0.40,
        }
    }

    /// Check the bands are strictly ordered within [0, 1]
    pub fn validate(&self) -> Result<(), AlertError> {
        let ordered = 0.0 <= self.notice
            && self.notice < self.warning
            && self.warning < self.critical
            && self.critical <= 1.0;
        if !ordered {
            return Err(AlertError::InvalidThresholds(format!(
                "expected 0 <= notice < warning < critical <= 1, got {:?}",
                self
            )));
        }
        Ok(())
    }

    /// Level for a confidence value
    pub fn level_for(&self, confidence: f64) -> AlertLevel {
        if confidence >= self.critical {
            AlertLevel::Critical
        } else if confidence >= self.warning {
            AlertLevel::Warning
        } else if confidence >= self.notice {
            AlertLevel::Notice
        } else {
            AlertLevel::Normal
        }
    }
}

/// Maps smoothed distributions to published driver states
#[derive(Debug, Clone, Default)]
pub struct AlertClassifier {
    thresholds: AlertThresholds,
    policy: ActionPolicy,
}

impl AlertClassifier {
    /// Create a classifier with validated thresholds
    pub fn new(thresholds: AlertThresholds, policy: ActionPolicy) -> Result<Self, AlertError> {
        thresholds.validate()?;
        info!("Creating alert classifier with thresholds: {:?}", thresholds);
        Ok(Self { thresholds, policy })
    }

    /// Classify a smoothed distribution. An empty distribution yields the
    /// "unknown" state; benign states always classify as NORMAL.
    pub fn classify(&self, distribution: &StateDistribution) -> DriverState {
        let Some((kind, confidence)) = distribution.dominant() else {
            return DriverState::unknown();
        };

        let alert_level = if kind.is_benign() {
            AlertLevel::Normal
        } else {
            self.thresholds.level_for(confidence)
        };
        let actions = self.policy.actions(kind, alert_level).to_vec();

        debug!(
            "Classified {} ({:.3}) as {} -> {:?}",
            kind, confidence, alert_level, actions
        );

        DriverState::new(
            PrimaryState::Known(kind),
            confidence,
            alert_level,
            distribution.clone(),
            actions,
        )
    }

    /// Active thresholds
    pub fn thresholds(&self) -> &AlertThresholds {
        &self.thresholds
    }

    /// Active action policy
    pub fn policy(&self) -> &ActionPolicy {
        &self.policy
    }
}
