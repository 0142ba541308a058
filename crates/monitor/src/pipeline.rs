//! Fuse, smooth and classify one cycle

use alerting::{ActionPolicy, AlertClassifier, AlertThresholds, DriverState};
use dms::ModalitySnapshot;
use event_fusion::{FusionConfig, FusionEngine, TemporalSmoother};
use std::sync::Arc;
use tracing::debug;

use crate::MonitorError;

/// Fusion engine, smoothing window and classifier for the fusion loop
pub struct FusionPipeline {
    engine: Arc<FusionEngine>,
    smoother: TemporalSmoother,
    classifier: AlertClassifier,
}

impl FusionPipeline {
    pub fn new(fusion: &FusionConfig, thresholds: AlertThresholds) -> Result<Self, MonitorError> {
        fusion.validate()?;
        Ok(Self {
            engine: Arc::new(FusionEngine::new(fusion.weights)?),
            smoother: TemporalSmoother::new(fusion.window_capacity)?,
            classifier: AlertClassifier::new(thresholds, ActionPolicy::standard())?,
        })
    }

    /// Shared engine handle, used to swap weight presets at runtime
    pub fn engine(&self) -> Arc<FusionEngine> {
        self.engine.clone()
    }

    /// Run one fusion cycle over whatever snapshots are available
    pub fn cycle(
        &mut self,
        visual: Option<&ModalitySnapshot>,
        audio: Option<&ModalitySnapshot>,
        driving: Option<&ModalitySnapshot>,
    ) -> DriverState {
        let fused = self.engine.fuse_snapshots(visual, audio, driving);
        debug!(
            "Fusion cycle: preset={:?} contributors={:?}",
            fused.preset, fused.contributors
        );
        let smoothed = self.smoother.push(fused);
        self.classifier.classify(&smoothed)
    }

    /// Forget the smoothing window
    pub fn reset(&mut self) {
        self.smoother.reset();
    }
}
