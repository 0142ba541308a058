//! Reliability-weighted fusion

use dms::{now_ms, DriverStateKind, Modality, ModalitySnapshot, StateDistribution, STATE_COUNT};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::weights::{WeightPreset, WeightPresets};
use crate::FusionError;

/// Result of one fusion step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedSnapshot {
    /// Fused scores (empty when no modality contributed)
    pub distribution: StateDistribution,

    /// Fusion timestamp (ms since Unix epoch)
    pub timestamp_ms: u64,

    /// Preset the weights came from
    pub preset: WeightPreset,

    /// Modalities whose scores were used
    pub contributors: Vec<Modality>,

    /// Modalities whose scores were malformed and dropped this cycle
    pub rejected: Vec<Modality>,
}

/// Fusion engine.
///
/// Stateless apart from the active weight presets, which can be swapped
/// atomically while fusion is running.
pub struct FusionEngine {
    presets: RwLock<Arc<WeightPresets>>,
}

impl FusionEngine {
    /// Create an engine with validated presets
    pub fn new(presets: WeightPresets) -> Result<Self, FusionError> {
        presets.validate()?;
        info!("Fusion engine created with presets: {:?}", presets);
        Ok(Self {
            presets: RwLock::new(Arc::new(presets)),
        })
    }

    /// Presets currently in use
    pub fn presets(&self) -> Arc<WeightPresets> {
        self.presets.read().clone()
    }

    /// Replace the active presets. Cycles already running keep the presets
    /// they started with.
    pub fn set_presets(&self, presets: WeightPresets) -> Result<(), FusionError> {
        presets.validate()?;
        info!("Switching fusion presets to {:?}", presets);
        *self.presets.write() = Arc::new(presets);
        Ok(())
    }

    /// Fuse one distribution per modality. `None` or an empty distribution
    /// marks the modality unavailable; an unavailable visual modality
    /// selects the degraded preset.
    pub fn fuse(
        &self,
        visual: Option<&StateDistribution>,
        audio: Option<&StateDistribution>,
        driving: Option<&StateDistribution>,
    ) -> FusedSnapshot {
        let presets = self.presets();
        let mut rejected = Vec::new();

        let visual = accept(Modality::Visual, visual, &mut rejected);
        let audio = accept(Modality::Audio, audio, &mut rejected);
        let driving = accept(Modality::Driving, driving, &mut rejected);

        let preset = if visual.is_some() {
            WeightPreset::Default
        } else {
            WeightPreset::VisualDegraded
        };
        let weights = presets.get(preset);

        let inputs = [
            (Modality::Visual, visual),
            (Modality::Audio, audio),
            (Modality::Driving, driving),
        ];
        let contributors: Vec<Modality> = inputs
            .iter()
            .filter(|(_, d)| d.is_some())
            .map(|(m, _)| *m)
            .collect();

        let distribution = if contributors.is_empty() {
            StateDistribution::empty()
        } else {
            let mut fused = [0.0; STATE_COUNT];
            for (modality, dist) in &inputs {
                let Some(dist) = dist else { continue };
                let weight = weights.weight(*modality);
                for kind in DriverStateKind::ALL {
                    fused[kind.index()] += weight * dist.get(kind);
                }
            }
            StateDistribution::from_scores(fused)
        };

        debug!(
            "Fused {:?} with {:?} preset (total={:.3})",
            contributors,
            preset,
            distribution.total()
        );

        FusedSnapshot {
            distribution,
            timestamp_ms: now_ms(),
            preset,
            contributors,
            rejected,
        }
    }

    /// Fuse modality snapshots. Missing snapshots and snapshots flagged
    /// unavailable do not contribute.
    pub fn fuse_snapshots(
        &self,
        visual: Option<&ModalitySnapshot>,
        audio: Option<&ModalitySnapshot>,
        driving: Option<&ModalitySnapshot>,
    ) -> FusedSnapshot {
        self.fuse(
            visual.and_then(ModalitySnapshot::contribution),
            audio.and_then(ModalitySnapshot::contribution),
            driving.and_then(ModalitySnapshot::contribution),
        )
    }
}

impl Default for FusionEngine {
    fn default() -> Self {
        Self {
            presets: RwLock::new(Arc::new(WeightPresets::default())),
        }
    }
}

/// Normalize a modality's scores, dropping them if malformed
fn accept(
    modality: Modality,
    dist: Option<&StateDistribution>,
    rejected: &mut Vec<Modality>,
) -> Option<StateDistribution> {
    let dist = dist.filter(|d| !d.is_empty())?;
    match dist.normalized() {
        Ok(normalized) => Some(normalized),
        Err(e) => {
            warn!("Dropping {} scores for this cycle: {}", modality, e);
            rejected.push(modality);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dms::DriverStateKind::*;
    use proptest::prelude::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_default_preset_scenario() {
        let engine = FusionEngine::default();
        let visual = StateDistribution::from_pairs([(Drowsy, 0.8), (Alert, 0.2)]);
        let driving = StateDistribution::from_pairs([(Drowsy, 0.6), (Normal, 0.4)]);

        let fused = engine.fuse(Some(&visual), None, Some(&driving));

        assert_eq!(fused.preset, WeightPreset::Default);
        assert!(approx(fused.distribution.get(Drowsy), 0.58));
        assert!(approx(fused.distribution.get(Alert), 0.1));
        assert!(approx(fused.distribution.get(Normal), 0.12));
        assert_eq!(fused.contributors, vec![Modality::Visual, Modality::Driving]);
    }

    #[test]
    fn test_visual_unavailable_uses_degraded_preset() {
        let engine = FusionEngine::default();
        let audio = StateDistribution::from_pairs([(Angry, 0.5), (Normal, 0.5)]);
        let driving = StateDistribution::from_pairs([(Drowsy, 0.6), (Normal, 0.4)]);

        let fused = engine.fuse(None, Some(&audio), Some(&driving));

        assert_eq!(fused.preset, WeightPreset::VisualDegraded);
        assert!(approx(fused.distribution.get(Drowsy), 0.7 * 0.6));
        assert!(approx(fused.distribution.get(Angry), 0.2 * 0.5));
        assert!(approx(fused.distribution.get(Normal), 0.2 * 0.5 + 0.7 * 0.4));
        assert!(approx(fused.distribution.total(), 0.9));

        // an explicitly empty visual distribution is the same marker
        let empty = StateDistribution::empty();
        let again = engine.fuse(Some(&empty), Some(&audio), Some(&driving));
        assert_eq!(again.distribution, fused.distribution);
    }

    #[test]
    fn test_all_modalities_sum_to_one() {
        let engine = FusionEngine::default();
        let normal = StateDistribution::certain(Normal);
        let fused = engine.fuse(Some(&normal), Some(&normal), Some(&normal));
        assert!(approx(fused.distribution.get(Normal), 1.0));
        assert!(fused.distribution.is_normalized());
    }

    #[test]
    fn test_unnormalized_modality_is_normalized_first() {
        let engine = FusionEngine::default();
        let visual = StateDistribution::from_pairs([(Distracted, 3.0), (Alert, 1.0)]);
        let normal = StateDistribution::certain(Normal);

        let fused = engine.fuse(Some(&visual), Some(&normal), Some(&normal));

        assert!(approx(fused.distribution.get(Distracted), 0.5 * 0.75));
        assert!(fused.distribution.is_normalized());
        assert!(fused.rejected.is_empty());
    }

    #[test]
    fn test_malformed_modality_is_dropped() {
        let engine = FusionEngine::default();
        let visual = StateDistribution::certain(Alert);
        let bad = StateDistribution::from_pairs([(Angry, -1.0), (Happy, 2.0)]);

        let fused = engine.fuse(Some(&visual), Some(&bad), None);

        assert_eq!(fused.rejected, vec![Modality::Audio]);
        assert_eq!(fused.contributors, vec![Modality::Visual]);
        assert!(approx(fused.distribution.get(Alert), 0.5));
        assert_eq!(fused.distribution.get(Angry), 0.0);
    }

    #[test]
    fn test_nothing_available_is_empty() {
        let engine = FusionEngine::default();
        let fused = engine.fuse(None, None, None);
        assert!(fused.distribution.is_empty());
        assert!(fused.contributors.is_empty());
    }

    #[test]
    fn test_unavailable_snapshot_does_not_contribute() {
        let engine = FusionEngine::default();
        let visual = ModalitySnapshot::unavailable(Modality::Visual);
        let driving = ModalitySnapshot::new(Modality::Driving, StateDistribution::certain(Ill));

        let fused = engine.fuse_snapshots(Some(&visual), None, Some(&driving));

        assert_eq!(fused.preset, WeightPreset::VisualDegraded);
        assert!(approx(fused.distribution.get(Ill), 0.7));
    }

    #[test]
    fn test_swap_presets() {
        let engine = FusionEngine::default();
        let custom = WeightPresets {
            default: crate::ReliabilityWeights::new(0.4, 0.2, 0.4).unwrap(),
            ..Default::default()
        };
        engine.set_presets(custom).unwrap();

        let drowsy = StateDistribution::certain(Drowsy);
        let fused = engine.fuse(Some(&drowsy), None, None);
        assert!(approx(fused.distribution.get(Drowsy), 0.4));

        let invalid = WeightPresets {
            default: crate::ReliabilityWeights {
                visual: 0.9,
                audio: 0.9,
                driving: 0.9,
            },
            ..Default::default()
        };
        assert!(engine.set_presets(invalid).is_err());
        assert_eq!(engine.presets().default.visual, 0.4);
    }

    fn distribution() -> impl Strategy<Value = StateDistribution> {
        prop::array::uniform8(0.0f64..1.0)
            .prop_filter("needs mass", |s| s.iter().sum::<f64>() > 1e-3)
            .prop_map(|s| StateDistribution::from_scores(s).normalized().unwrap())
    }

    proptest! {
        #[test]
        fn prop_fused_sums_to_one(v in distribution(), a in distribution(), d in distribution()) {
            let engine = FusionEngine::default();
            let fused = engine.fuse(Some(&v), Some(&a), Some(&d));
            prop_assert!((fused.distribution.total() - 1.0).abs() < 1e-6);
        }

        #[test]
        fn prop_degraded_matches_preset(a in distribution(), d in distribution()) {
            let engine = FusionEngine::default();
            let fused = engine.fuse(None, Some(&a), Some(&d));
            for kind in DriverStateKind::ALL {
                let expected = 0.2 * a.get(kind) + 0.7 * d.get(kind);
                prop_assert!((fused.distribution.get(kind) - expected).abs() < 1e-12);
            }
        }
    }
}
