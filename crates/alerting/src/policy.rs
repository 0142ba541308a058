//! Recommended action policy

use dms::DriverStateKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::classifier::AlertLevel;

/// Action the vehicle or driver should take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    AutonomousPullover,
    EmergencyServices,
    HazardLights,
    LoudAlert,
    SeatVibration,
    SuggestBreak,
    SuggestBreakNow,
    SuggestBreakSoon,
    VisualWarning,
    GentleReminder,
    CalmMusic,
    BreathingExercises,
    SuggestPullover,
    ComfortMessage,
    AudioReminder,
    GentleAlert,
    MedicalAlert,
    SuggestStop,
    ContactHelp,
    SuggestRest,
    MonitorCondition,
    HapticWarning,
    EmergencyAudio,
    ContinueMonitoring,
}

impl Action {
    /// Get string representation
    pub fn as_str(self) -> &'static str {
        match self {
            Action::AutonomousPullover => "AUTONOMOUS_PULLOVER",
            Action::EmergencyServices => "EMERGENCY_SERVICES",
            Action::HazardLights => "HAZARD_LIGHTS",
            Action::LoudAlert => "LOUD_ALERT",
            Action::SeatVibration => "SEAT_VIBRATION",
            Action::SuggestBreak => "SUGGEST_BREAK",
            Action::SuggestBreakNow => "SUGGEST_BREAK_NOW",
            Action::SuggestBreakSoon => "SUGGEST_BREAK_SOON",
            Action::VisualWarning => "VISUAL_WARNING",
            Action::GentleReminder => "GENTLE_REMINDER",
            Action::CalmMusic => "CALM_MUSIC",
            Action::BreathingExercises => "BREATHING_EXERCISES",
            Action::SuggestPullover => "SUGGEST_PULLOVER",
            Action::ComfortMessage => "COMFORT_MESSAGE",
            Action::AudioReminder => "AUDIO_REMINDER",
            Action::GentleAlert => "GENTLE_ALERT",
            Action::MedicalAlert => "MEDICAL_ALERT",
            Action::SuggestStop => "SUGGEST_STOP",
            Action::ContactHelp => "CONTACT_HELP",
            Action::SuggestRest => "SUGGEST_REST",
            Action::MonitorCondition => "MONITOR_CONDITION",
            Action::HapticWarning => "HAPTIC_WARNING",
            Action::EmergencyAudio => "EMERGENCY_AUDIO",
            Action::ContinueMonitoring => "CONTINUE_MONITORING",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Actions for any (state, level) without an explicit entry
pub const DEFAULT_ACTIONS: &[Action] = &[Action::ContinueMonitoring];

use Action::*;
use AlertLevel::*;
use DriverStateKind::*;

/// Standard table, in (state, level) order
const STANDARD_POLICY: &[(DriverStateKind, AlertLevel, &[Action])] = &[
    (Drowsy, Critical, &[LoudAlert, SeatVibration, SuggestBreakNow]),
    (Drowsy, Warning, &[VisualWarning, SuggestBreakSoon]),
    (Drowsy, Notice, &[GentleReminder]),
    (Distracted, Warning, &[VisualWarning, AudioReminder]),
    (Distracted, Notice, &[GentleAlert]),
    (Angry, Warning, &[CalmMusic, BreathingExercises, SuggestPullover]),
    (Angry, Notice, &[ComfortMessage]),
    (Ill, Critical, &[MedicalAlert, SuggestStop, ContactHelp]),
    (Ill, Warning, &[SuggestRest, MonitorCondition]),
    (Unconscious, Critical, &[AutonomousPullover, EmergencyServices, HazardLights]),
    (Unconscious, Warning, &[LoudAlert, SeatVibration, SuggestBreak]),
];

/// Lookup table from (state, level) to an ordered action list
#[derive(Debug, Clone, PartialEq)]
pub struct ActionPolicy {
    entries: BTreeMap<(DriverStateKind, AlertLevel), Vec<Action>>,
}

impl ActionPolicy {
    /// Policy with no entries; everything resolves to the default actions
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// The standard in-cabin response table
    pub fn standard() -> Self {
        let entries = STANDARD_POLICY
            .iter()
            .map(|(state, level, actions)| ((*state, *level), actions.to_vec()))
            .collect();
        Self { entries }
    }

    /// Add or replace an entry
    pub fn with_entry(
        mut self,
        state: DriverStateKind,
        level: AlertLevel,
        actions: Vec<Action>,
    ) -> Self {
        self.entries.insert((state, level), actions);
        self
    }

    /// Actions for a state at a level
    pub fn actions(&self, state: DriverStateKind, level: AlertLevel) -> &[Action] {
        self.entries
            .get(&(state, level))
            .map(Vec::as_slice)
            .unwrap_or(DEFAULT_ACTIONS)
    }

    /// Explicit entries in (state, level) order
    pub fn entries(&self) -> impl Iterator<Item = (DriverStateKind, AlertLevel, &[Action])> + '_ {
        self.entries
            .iter()
            .map(|((state, level), actions)| (*state, *level, actions.as_slice()))
    }

    /// Number of explicit entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the policy has no explicit entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ActionPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhaustive_lookup() {
        let policy = ActionPolicy::standard();
        let mut explicit = 0;

        for state in DriverStateKind::ALL {
            for level in AlertLevel::ALL {
                let actions = policy.actions(state, level);
                assert!(!actions.is_empty(), "{} {} has no actions", state, level);

                let listed = STANDARD_POLICY
                    .iter()
                    .find(|(s, l, _)| *s == state && *l == level);
                match listed {
                    Some((_, _, expected)) => {
                        explicit += 1;
                        assert_eq!(actions, *expected);
                    }
                    None => assert_eq!(actions, DEFAULT_ACTIONS),
                }
            }
        }

        assert_eq!(explicit, STANDARD_POLICY.len());
        assert_eq!(policy.len(), STANDARD_POLICY.len());
    }

    #[test]
    fn test_benign_states_have_no_entries() {
        let policy = ActionPolicy::standard();
        assert!(policy
            .entries()
            .all(|(state, _, _)| !state.is_benign()));
        assert!(policy
            .entries()
            .all(|(_, level, _)| level != AlertLevel::Normal));
    }

    #[test]
    fn test_custom_entry() {
        let policy = ActionPolicy::empty().with_entry(
            Happy,
            Notice,
            vec![ComfortMessage],
        );
        assert_eq!(policy.actions(Happy, Notice), &[ComfortMessage]);
        assert_eq!(policy.actions(Drowsy, Critical), DEFAULT_ACTIONS);
    }

    #[test]
    fn test_action_names() {
        assert_eq!(AutonomousPullover.to_string(), "AUTONOMOUS_PULLOVER");
        assert_eq!(ContinueMonitoring.as_str(), "CONTINUE_MONITORING");
    }
}
