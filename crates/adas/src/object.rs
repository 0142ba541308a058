//! Vehicle detections in the blind-spot camera

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::frame::RoadFrame;
use crate::region::BlindSpotRegion;
use crate::AdasError;

/// Aspect ratio (width / height) above which a truck is a semi
const SEMI_ASPECT_RATIO: f64 = 2.5;

/// Normalized area that maps to the nearest estimated distance
const DISTANCE_AREA_SCALE: f64 = 10.0;

/// Vehicle category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    Semi,
    Truck,
    Bus,
    Car,
    Motorcycle,
    Bicycle,
    Person,
    Unknown,
}

impl VehicleType {
    /// Map a COCO class id. Non-road classes are `None`.
    pub fn from_coco_class(class_id: u32) -> Option<Self> {
        match class_id {
            0 => Some(VehicleType::Person),
            1 => Some(VehicleType::Bicycle),
            2 => Some(VehicleType::Car),
            3 => Some(VehicleType::Motorcycle),
            5 => Some(VehicleType::Bus),
            7 => Some(VehicleType::Truck),
            _ => None,
        }
    }

    /// Refine a detector class using the box shape
    pub fn refine(self, bbox: &BoundingBox) -> Self {
        match self {
            VehicleType::Truck if bbox.aspect_ratio() > SEMI_ASPECT_RATIO => VehicleType::Semi,
            other => other,
        }
    }

    /// Severity weight (semi highest, bicycle lowest)
    pub fn severity(self) -> f64 {
        match self {
            VehicleType::Semi => 1.0,
            VehicleType::Truck => 0.9,
            VehicleType::Bus => 0.8,
            VehicleType::Car => 0.7,
            VehicleType::Motorcycle => 0.6,
            VehicleType::Bicycle | VehicleType::Person | VehicleType::Unknown => 0.5,
        }
    }

    /// Get string representation
    pub fn as_str(self) -> &'static str {
        match self {
            VehicleType::Semi => "semi",
            VehicleType::Truck => "truck",
            VehicleType::Bus => "bus",
            VehicleType::Car => "car",
            VehicleType::Motorcycle => "motorcycle",
            VehicleType::Bicycle => "bicycle",
            VehicleType::Person => "person",
            VehicleType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bounding box in normalized [0,1] coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    /// Create a box, ordering the corners
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    /// Fraction of the frame covered
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Width over height (0 for degenerate boxes)
    pub fn aspect_ratio(&self) -> f64 {
        if self.height() > 0.0 {
            self.width() / self.height()
        } else {
            0.0
        }
    }

    /// Relative distance from apparent size: larger boxes are closer.
    /// 0 is touching, 1 is far or unknown.
    pub fn estimate_distance(&self) -> f64 {
        let area = self.area();
        if area > 0.0 {
            (1.0 / (area * DISTANCE_AREA_SCALE)).min(1.0)
        } else {
            1.0
        }
    }
}

/// One vehicle detected in one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub vehicle_type: VehicleType,
    pub bbox: BoundingBox,
    /// Detector confidence (0-1)
    pub confidence: f64,
    /// Estimated relative distance (0 = touching, 1 = far)
    pub distance: f64,
    /// Blind-spot region the center falls in, if any
    pub region: Option<String>,
    pub center: (f64, f64),
}

impl Detection {
    /// Create a detection with a known distance
    pub fn new(
        vehicle_type: VehicleType,
        bbox: BoundingBox,
        confidence: f64,
        distance: f64,
        region: Option<String>,
    ) -> Self {
        Self {
            vehicle_type,
            center: bbox.center(),
            bbox,
            confidence: unit_or(confidence, 0.0),
            distance: unit_or(distance, 1.0),
            region,
        }
    }

    /// Build a detection from a normalized box: refines the vehicle type,
    /// estimates distance and locates the first containing region.
    pub fn from_normalized_bbox(
        vehicle_type: VehicleType,
        bbox: BoundingBox,
        confidence: f64,
        regions: &[BlindSpotRegion],
    ) -> Self {
        let region = BlindSpotRegion::locate(regions, bbox.center()).map(|r| r.name.clone());
        Self::new(
            vehicle_type.refine(&bbox),
            bbox,
            confidence,
            bbox.estimate_distance(),
            region,
        )
    }

    /// Whether the detection lies in a blind spot
    pub fn in_blind_spot(&self) -> bool {
        self.region.is_some()
    }

    /// Short description for alerts and logs
    pub fn summary(&self) -> String {
        format!(
            "{} conf={:.2} dist={:.2} region={}",
            self.vehicle_type,
            self.confidence,
            self.distance,
            self.region.as_deref().unwrap_or("none")
        )
    }
}

/// Clamp to [0,1]; non-finite values become `fallback`
pub(crate) fn unit_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        fallback
    }
}

/// Object detector collaborator
pub trait ObjectDetector: Send {
    /// Detect vehicles in a frame
    fn detect(&mut self, frame: &RoadFrame) -> Result<Vec<Detection>, AdasError>;
}

impl<D: ObjectDetector + ?Sized> ObjectDetector for Box<D> {
    fn detect(&mut self, frame: &RoadFrame) -> Result<Vec<Detection>, AdasError> {
        (**self).detect(frame)
    }
}
