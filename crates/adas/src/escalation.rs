//! Escalation of blind-spot alerts using the published driver state

use alerting::{Action, DriverState};
use std::sync::Arc;
use tokio::sync::watch;

use crate::threat::{ThreatAlert, ThreatLevel};

/// Read-only access to the latest published driver state
pub trait DriverStateProvider: Send + Sync {
    fn latest(&self) -> Arc<DriverState>;
}

impl DriverStateProvider for watch::Receiver<Arc<DriverState>> {
    fn latest(&self) -> Arc<DriverState> {
        self.borrow().clone()
    }
}

/// Warning raised on top of a base alert
#[derive(Debug, Clone)]
pub struct EscalatedWarning {
    pub alert: ThreatAlert,
    pub driver_state: Arc<DriverState>,
    pub actions: Vec<Action>,
}

impl EscalatedWarning {
    pub fn summary(&self) -> String {
        let actions: Vec<&str> = self.actions.iter().map(|a| a.as_str()).collect();
        format!(
            "ESCALATED: {} while driver {} | Actions: {}",
            self.alert.message,
            self.driver_state.primary_state.as_str(),
            actions.join(", ")
        )
    }
}

/// When to escalate and with which actions
#[derive(Debug, Clone)]
pub struct EscalationPolicy {
    pub min_level: ThreatLevel,
    pub actions: Vec<Action>,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            min_level: ThreatLevel::High,
            actions: vec![Action::HapticWarning, Action::EmergencyAudio],
        }
    }
}

impl EscalationPolicy {
    /// Escalate when the alert reaches the level and the driver is
    /// drowsy or distracted. Never writes the driver state.
    pub fn evaluate(&self, alert: &ThreatAlert, state: Arc<DriverState>) -> Option<EscalatedWarning> {
        if alert.level < self.min_level || !state.is_inattentive() {
            return None;
        }
        Some(EscalatedWarning {
            alert: alert.clone(),
            driver_state: state,
            actions: self.actions.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{BoundingBox, Detection, VehicleType};
    use crate::threat::ThreatAssessor;
    use alerting::AlertClassifier;
    use dms::{DriverStateKind, StateDistribution};

    fn alert_with_score(score: f64) -> ThreatAlert {
        let det = Detection::new(
            VehicleType::Truck,
            BoundingBox::new(0.6, 0.4, 0.9, 0.7),
            0.9,
            0.1,
            Some("left".into()),
        );
        ThreatAssessor::default().to_alert(&det, score, 0)
    }

    fn state(kind: DriverStateKind) -> Arc<DriverState> {
        Arc::new(AlertClassifier::default().classify(&StateDistribution::certain(kind)))
    }

    #[test]
    fn test_high_alert_with_drowsy_driver_escalates() {
        let policy = EscalationPolicy::default();
        let warning = policy
            .evaluate(&alert_with_score(0.9), state(DriverStateKind::Drowsy))
            .expect("escalation");
        assert_eq!(warning.actions, vec![Action::HapticWarning, Action::EmergencyAudio]);
        assert!(warning.summary().contains("drowsy"));

        assert!(policy
            .evaluate(&alert_with_score(0.9), state(DriverStateKind::Distracted))
            .is_some());
    }

    #[test]
    fn test_no_escalation_for_attentive_driver_or_medium_alert() {
        let policy = EscalationPolicy::default();
        assert!(policy
            .evaluate(&alert_with_score(0.9), state(DriverStateKind::Normal))
            .is_none());
        assert!(policy
            .evaluate(&alert_with_score(0.9), state(DriverStateKind::Angry))
            .is_none());
        assert!(policy
            .evaluate(&alert_with_score(0.5), state(DriverStateKind::Drowsy))
            .is_none());
        assert!(policy
            .evaluate(&alert_with_score(0.9), Arc::new(DriverState::unknown()))
            .is_none());
    }

    #[test]
    fn test_watch_receiver_provides_latest() {
        let (tx, rx) = watch::channel(Arc::new(DriverState::unknown()));
        assert!(!rx.latest().is_inattentive());
        tx.send_replace(state(DriverStateKind::Drowsy));
        assert!(rx.latest().is_inattentive());
    }
}
