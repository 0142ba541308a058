//! Published driver state

use dms::{now_ms, DriverStateKind, StateDistribution};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::classifier::AlertLevel;
use crate::policy::{Action, DEFAULT_ACTIONS};

/// Dominant driver state, or unknown before any data has arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum PrimaryState {
    Unknown,
    Known(DriverStateKind),
}

impl PrimaryState {
    /// The known state, if any
    pub fn kind(self) -> Option<DriverStateKind> {
        match self {
            PrimaryState::Unknown => None,
            PrimaryState::Known(kind) => Some(kind),
        }
    }

    /// Get string representation
    pub fn as_str(self) -> &'static str {
        match self {
            PrimaryState::Unknown => "unknown",
            PrimaryState::Known(kind) => kind.as_str(),
        }
    }
}

impl fmt::Display for PrimaryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<PrimaryState> for String {
    fn from(state: PrimaryState) -> Self {
        state.as_str().to_string()
    }
}

impl TryFrom<String> for PrimaryState {
    type Error = dms::DmsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.eq_ignore_ascii_case("unknown") {
            return Ok(PrimaryState::Unknown);
        }
        value.parse().map(PrimaryState::Known)
    }
}

/// Driver state published once per fusion cycle.
///
/// Immutable after construction; consumers always receive a whole value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverState {
    pub primary_state: PrimaryState,
    /// Score of the primary state (0-1)
    pub confidence: f64,
    pub alert_level: AlertLevel,
    /// Classification time (ms since Unix epoch)
    pub timestamp_ms: u64,
    /// Smoothed distribution the state was derived from
    pub distribution: StateDistribution,
    /// Ordered recommended actions
    pub recommended_actions: Vec<Action>,
}

impl DriverState {
    pub(crate) fn new(
        primary_state: PrimaryState,
        confidence: f64,
        alert_level: AlertLevel,
        distribution: StateDistribution,
        recommended_actions: Vec<Action>,
    ) -> Self {
        Self {
            primary_state,
            confidence,
            alert_level,
            timestamp_ms: now_ms(),
            distribution,
            recommended_actions,
        }
    }

    /// State before the first fusion cycle
    pub fn unknown() -> Self {
        Self::new(
            PrimaryState::Unknown,
            0.0,
            AlertLevel::Normal,
            StateDistribution::empty(),
            DEFAULT_ACTIONS.to_vec(),
        )
    }

    /// Whether the driver is drowsy or distracted
    pub fn is_inattentive(&self) -> bool {
        self.primary_state
            .kind()
            .is_some_and(DriverStateKind::is_inattentive)
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        let actions: Vec<&str> = self.recommended_actions.iter().map(|a| a.as_str()).collect();
        format!(
            "Driver State: {} ({:.2}) | Alert: {} | Actions: {}",
            self.primary_state.as_str().to_uppercase(),
            self.confidence,
            self.alert_level,
            actions.join(", ")
        )
    }
}

impl Default for DriverState {
    fn default() -> Self {
        Self::unknown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_state() {
        let state = DriverState::default();
        assert_eq!(state.primary_state.kind(), None);
        assert!(!state.is_inattentive());
        assert_eq!(state.recommended_actions, vec![Action::ContinueMonitoring]);
    }

    #[test]
    fn test_primary_state_serializes_as_name() {
        let json = serde_json::to_string(&PrimaryState::Known(DriverStateKind::Drowsy)).unwrap();
        assert_eq!(json, "\"drowsy\"");
        let json = serde_json::to_string(&PrimaryState::Unknown).unwrap();
        assert_eq!(json, "\"unknown\"");

        let parsed: PrimaryState = serde_json::from_str("\"ill\"").unwrap();
        assert_eq!(parsed, PrimaryState::Known(DriverStateKind::Ill));
        assert!(serde_json::from_str::<PrimaryState>("\"sleepy\"").is_err());
    }

    #[test]
    fn test_driver_state_round_trip() {
        let state = DriverState::new(
            PrimaryState::Known(DriverStateKind::Distracted),
            0.55,
            AlertLevel::Warning,
            StateDistribution::from_pairs([(DriverStateKind::Distracted, 0.55)]),
            vec![Action::VisualWarning, Action::AudioReminder],
        );
        assert!(state.is_inattentive());

        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"alert_level\":\"WARNING\""));
        assert!(json.contains("\"VISUAL_WARNING\""));
        let back: DriverState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_summary() {
        let state = DriverState::unknown();
        assert_eq!(
            state.summary(),
            "Driver State: UNKNOWN (0.00) | Alert: NORMAL | Actions: CONTINUE_MONITORING"
        );
    }
}
