//! Driver state enumeration and score distributions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::DmsError;

/// Number of driver states
pub const STATE_COUNT: usize = 8;

/// Tolerance for the sum-to-one invariant
pub const SUM_EPSILON: f64 = 1e-6;

/// Tolerance when comparing scores for the dominant state
const TIE_EPSILON: f64 = 1e-9;

/// Driver state, in fixed enumeration order.
///
/// The order is significant: it breaks ties when two states share the
/// highest score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverStateKind {
    Alert,
    Drowsy,
    Distracted,
    Angry,
    Happy,
    Ill,
    Unconscious,
    Normal,
}

impl DriverStateKind {
    /// All states in enumeration order
    pub const ALL: [DriverStateKind; STATE_COUNT] = [
        DriverStateKind::Alert,
        DriverStateKind::Drowsy,
        DriverStateKind::Distracted,
        DriverStateKind::Angry,
        DriverStateKind::Happy,
        DriverStateKind::Ill,
        DriverStateKind::Unconscious,
        DriverStateKind::Normal,
    ];

    /// Position in the enumeration
    pub fn index(self) -> usize {
        self as usize
    }

    /// Get string representation
    pub fn as_str(self) -> &'static str {
        match self {
            DriverStateKind::Alert => "alert",
            DriverStateKind::Drowsy => "drowsy",
            DriverStateKind::Distracted => "distracted",
            DriverStateKind::Angry => "angry",
            DriverStateKind::Happy => "happy",
            DriverStateKind::Ill => "ill",
            DriverStateKind::Unconscious => "unconscious",
            DriverStateKind::Normal => "normal",
        }
    }

    /// States that never warrant an alert, however confident
    pub fn is_benign(self) -> bool {
        matches!(
            self,
            DriverStateKind::Alert | DriverStateKind::Happy | DriverStateKind::Normal
        )
    }

    /// Whether the driver is not paying attention to the road
    pub fn is_inattentive(self) -> bool {
        matches!(self, DriverStateKind::Drowsy | DriverStateKind::Distracted)
    }
}

impl fmt::Display for DriverStateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DriverStateKind {
    type Err = DmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DriverStateKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DmsError::UnknownState(s.to_string()))
    }
}

/// Scores over the fixed driver-state enumeration.
///
/// An empty distribution means the modality had nothing to say this cycle
/// and is distinct from a populated all-zero one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDistribution {
    scores: Option<[f64; STATE_COUNT]>,
}

impl StateDistribution {
    /// The "modality unavailable" distribution
    pub fn empty() -> Self {
        Self { scores: None }
    }

    /// Distribution from raw scores in enumeration order (not normalized)
    pub fn from_scores(scores: [f64; STATE_COUNT]) -> Self {
        Self { scores: Some(scores) }
    }

    /// Distribution from (state, score) pairs. Missing states score 0,
    /// repeated states accumulate.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (DriverStateKind, f64)>,
    {
        let mut scores = [0.0; STATE_COUNT];
        for (kind, score) in pairs {
            scores[kind.index()] += score;
        }
        Self::from_scores(scores)
    }

    /// All mass on a single state
    pub fn certain(kind: DriverStateKind) -> Self {
        Self::from_pairs([(kind, 1.0)])
    }

    /// Parse label-keyed scores as produced by loosely-typed scorers.
    /// Unknown labels are rejected.
    pub fn from_labels<'a, I>(labels: I) -> Result<Self, DmsError>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut pairs = Vec::new();
        for (label, score) in labels {
            pairs.push((label.parse::<DriverStateKind>()?, score));
        }
        Ok(Self::from_pairs(pairs))
    }

    /// Whether this is the "unavailable" distribution
    pub fn is_empty(&self) -> bool {
        self.scores.is_none()
    }

    /// Score for a state (0 when absent)
    pub fn get(&self, kind: DriverStateKind) -> f64 {
        self.scores.map(|s| s[kind.index()]).unwrap_or(0.0)
    }

    /// Raw scores in enumeration order
    pub fn scores(&self) -> Option<&[f64; STATE_COUNT]> {
        self.scores.as_ref()
    }

    /// Iterate (state, score) in enumeration order. Empty yields nothing.
    pub fn iter(&self) -> impl Iterator<Item = (DriverStateKind, f64)> + '_ {
        self.scores
            .iter()
            .flat_map(|s| DriverStateKind::ALL.iter().map(move |k| (*k, s[k.index()])))
    }

    /// Sum of all scores
    pub fn total(&self) -> f64 {
        self.scores.map(|s| s.iter().sum()).unwrap_or(0.0)
    }

    /// Whether the scores sum to 1 within [`SUM_EPSILON`]
    pub fn is_normalized(&self) -> bool {
        !self.is_empty() && (self.total() - 1.0).abs() <= SUM_EPSILON
    }

    /// Normalized copy. Empty stays empty; negative, non-finite or all-zero
    /// scores are malformed.
    pub fn normalized(&self) -> Result<Self, DmsError> {
        let Some(scores) = self.scores else {
            return Ok(Self::empty());
        };

        if let Some(bad) = scores.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(DmsError::MalformedDistribution(format!(
                "score {} is not a finite non-negative value",
                bad
            )));
        }

        let total: f64 = scores.iter().sum();
        if total <= 0.0 {
            return Err(DmsError::MalformedDistribution(
                "scores sum to zero".to_string(),
            ));
        }

        if (total - 1.0).abs() <= SUM_EPSILON {
            return Ok(self.clone());
        }

        Ok(Self::from_scores(scores.map(|v| v / total)))
    }

    /// Highest-scoring state. Ties resolve to the earlier state in
    /// enumeration order. `None` when empty.
    pub fn dominant(&self) -> Option<(DriverStateKind, f64)> {
        let scores = self.scores?;
        let mut best = (DriverStateKind::ALL[0], scores[0]);
        for kind in DriverStateKind::ALL.iter().skip(1) {
            let score = scores[kind.index()];
            if score > best.1 + TIE_EPSILON {
                best = (*kind, score);
            }
        }
        Some(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use DriverStateKind::*;

    #[test]
    fn test_enumeration_order() {
        let names: Vec<_> = DriverStateKind::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(
            names,
            ["alert", "drowsy", "distracted", "angry", "happy", "ill", "unconscious", "normal"]
        );
        assert_eq!(Normal.index(), 7);
    }

    #[test]
    fn test_benign_and_inattentive() {
        assert!(Normal.is_benign());
        assert!(Alert.is_benign());
        assert!(!Drowsy.is_benign());
        assert!(Drowsy.is_inattentive());
        assert!(Distracted.is_inattentive());
        assert!(!Unconscious.is_inattentive());
    }

    #[test]
    fn test_parse_state() {
        assert_eq!("Drowsy".parse::<DriverStateKind>().unwrap(), Drowsy);
        assert!(matches!(
            "sleepy".parse::<DriverStateKind>(),
            Err(DmsError::UnknownState(_))
        ));
    }

    #[test]
    fn test_empty_is_not_zero() {
        let empty = StateDistribution::empty();
        let zero = StateDistribution::from_scores([0.0; STATE_COUNT]);
        assert!(empty.is_empty());
        assert!(!zero.is_empty());
        assert_ne!(empty, zero);
        assert_eq!(empty.get(Drowsy), 0.0);
        assert_eq!(empty.iter().count(), 0);
        assert_eq!(zero.iter().count(), STATE_COUNT);
    }

    #[test]
    fn test_from_labels() {
        let dist = StateDistribution::from_labels([("drowsy", 0.8), ("alert", 0.2)]).unwrap();
        assert_eq!(dist.get(Drowsy), 0.8);
        assert_eq!(dist.get(Alert), 0.2);
        assert_eq!(dist.get(Normal), 0.0);

        let err = StateDistribution::from_labels([("drowsy", 0.5), ("bored", 0.5)]);
        assert!(matches!(err, Err(DmsError::UnknownState(label)) if label == "bored"));
    }

    #[test]
    fn test_normalize() {
        let dist = StateDistribution::from_pairs([(Drowsy, 2.0), (Normal, 2.0)]);
        let norm = dist.normalized().unwrap();
        assert!(norm.is_normalized());
        assert!((norm.get(Drowsy) - 0.5).abs() < 1e-12);

        assert!(StateDistribution::empty().normalized().unwrap().is_empty());
        assert!(StateDistribution::from_scores([0.0; STATE_COUNT]).normalized().is_err());
        assert!(StateDistribution::from_pairs([(Angry, -0.5), (Happy, 1.5)])
            .normalized()
            .is_err());
        assert!(StateDistribution::from_pairs([(Angry, f64::NAN)]).normalized().is_err());
    }

    #[test]
    fn test_dominant_tie_prefers_earlier_state() {
        let dist = StateDistribution::from_pairs([(Normal, 0.4), (Drowsy, 0.4), (Angry, 0.2)]);
        for _ in 0..10 {
            assert_eq!(dist.dominant(), Some((Drowsy, 0.4)));
        }
        assert_eq!(StateDistribution::empty().dominant(), None);
    }

    #[test]
    fn test_dominant_clear_winner() {
        let dist = StateDistribution::from_pairs([(Alert, 0.1), (Unconscious, 0.9)]);
        assert_eq!(dist.dominant(), Some((Unconscious, 0.9)));
    }
}
