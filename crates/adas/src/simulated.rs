//! Camera and detector stand-ins for running without hardware

use dms::now_ms;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::frame::{FrameSource, RoadFrame};
use crate::object::{BoundingBox, Detection, ObjectDetector, VehicleType};
use crate::region::BlindSpotRegion;
use crate::AdasError;

/// COCO classes the simulated detector emits
const ROAD_CLASSES: [u32; 6] = [0, 1, 2, 3, 5, 7];

/// Camera producing blank frames with increasing sequence numbers
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    sequence: u64,
    fail_open: bool,
    released: Option<Arc<AtomicBool>>,
}

impl SyntheticCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            sequence: 0,
            fail_open: false,
            released: None,
        }
    }

    /// Camera whose `open` fails
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Set `flag` when the camera is released
    pub fn track_release(mut self, flag: Arc<AtomicBool>) -> Self {
        self.released = Some(flag);
        self
    }
}

impl FrameSource for SyntheticCamera {
    fn open(&mut self) -> Result<(), AdasError> {
        if self.fail_open {
            return Err(AdasError::CameraUnavailable("synthetic camera disabled".into()));
        }
        Ok(())
    }

    fn capture(&mut self) -> Result<Option<RoadFrame>, AdasError> {
        self.sequence += 1;
        let len = (self.width * self.height * 3) as usize;
        Ok(Some(RoadFrame::new(
            vec![0; len],
            self.width,
            self.height,
            now_ms(),
            self.sequence,
        )))
    }

    fn release(&mut self) {
        if let Some(flag) = &self.released {
            flag.store(true, Ordering::SeqCst);
        }
    }
}

/// Detector replaying a fixed script
pub struct ScriptedDetector {
    steps: VecDeque<Result<Vec<Detection>, AdasError>>,
    repeat: Option<Vec<Detection>>,
}

impl ScriptedDetector {
    /// Play `steps` once, then report no detections
    pub fn new(steps: Vec<Result<Vec<Detection>, AdasError>>) -> Self {
        Self {
            steps: steps.into(),
            repeat: None,
        }
    }

    /// Report the same detections on every frame
    pub fn repeating(detections: Vec<Detection>) -> Self {
        Self {
            steps: VecDeque::new(),
            repeat: Some(detections),
        }
    }
}

impl ObjectDetector for ScriptedDetector {
    fn detect(&mut self, _frame: &RoadFrame) -> Result<Vec<Detection>, AdasError> {
        if let Some(step) = self.steps.pop_front() {
            return step;
        }
        Ok(self.repeat.clone().unwrap_or_default())
    }
}

/// Detector emitting random road users
pub struct SimulatedDetector {
    rng: StdRng,
    regions: Vec<BlindSpotRegion>,
    max_objects: usize,
}

impl SimulatedDetector {
    pub fn new(regions: Vec<BlindSpotRegion>) -> Self {
        Self::with_rng(regions, StdRng::from_entropy())
    }

    /// Deterministic detector for tests
    pub fn seeded(regions: Vec<BlindSpotRegion>, seed: u64) -> Self {
        Self::with_rng(regions, StdRng::seed_from_u64(seed))
    }

    fn with_rng(regions: Vec<BlindSpotRegion>, rng: StdRng) -> Self {
        Self {
            rng,
            regions,
            max_objects: 3,
        }
    }

    pub fn with_max_objects(mut self, max_objects: usize) -> Self {
        self.max_objects = max_objects;
        self
    }
}

impl ObjectDetector for SimulatedDetector {
    fn detect(&mut self, _frame: &RoadFrame) -> Result<Vec<Detection>, AdasError> {
        let count = self.rng.gen_range(0..=self.max_objects);
        let mut detections = Vec::with_capacity(count);

        for _ in 0..count {
            let class = ROAD_CLASSES[self.rng.gen_range(0..ROAD_CLASSES.len())];
            let vehicle_type = VehicleType::from_coco_class(class).unwrap_or(VehicleType::Unknown);
            let w = self.rng.gen_range(0.05..0.5);
            let h = self.rng.gen_range(0.05..0.4);
            let x1 = self.rng.gen_range(0.0..1.0 - w);
            let y1 = self.rng.gen_range(0.0..1.0 - h);
            let bbox = BoundingBox::new(x1, y1, x1 + w, y1 + h);
            let confidence = self.rng.gen_range(0.3..1.0);

            detections.push(Detection::from_normalized_bbox(
                vehicle_type,
                bbox,
                confidence,
                &self.regions,
            ));
        }

        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_camera_sequence() {
        let mut camera = SyntheticCamera::new(4, 2);
        let first = camera.capture().unwrap().unwrap();
        let second = camera.capture().unwrap().unwrap();
        assert_eq!(first.data.len(), 24);
        assert_eq!((first.sequence, second.sequence), (1, 2));
    }

    #[test]
    fn test_scripted_detector_then_empty() {
        let frame = RoadFrame::default();
        let mut detector = ScriptedDetector::new(vec![Err(AdasError::Detection("boom".into()))]);
        assert!(detector.detect(&frame).is_err());
        assert!(detector.detect(&frame).unwrap().is_empty());
    }

    #[test]
    fn test_simulated_detections_are_normalized() {
        let frame = RoadFrame::default();
        let mut detector = SimulatedDetector::seeded(BlindSpotRegion::defaults(), 3);
        for _ in 0..50 {
            for det in detector.detect(&frame).unwrap() {
                assert!(det.bbox.x2 <= 1.0 + 1e-9 && det.bbox.y2 <= 1.0 + 1e-9);
                assert!((0.0..=1.0).contains(&det.distance));
                assert!((0.3..1.0).contains(&det.confidence));
            }
        }
    }
}
