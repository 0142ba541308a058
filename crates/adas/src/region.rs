//! Blind-spot regions in normalized image coordinates

use serde::{Deserialize, Serialize};

use crate::AdasError;

/// Named polygon in normalized [0,1]x[0,1] image space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlindSpotRegion {
    pub name: String,
    pub polygon: Vec<(f64, f64)>,
}

impl BlindSpotRegion {
    /// Create a validated region
    pub fn new(name: impl Into<String>, polygon: Vec<(f64, f64)>) -> Result<Self, AdasError> {
        let region = Self {
            name: name.into(),
            polygon,
        };
        region.validate()?;
        Ok(region)
    }

    /// Left blind spot on the rear camera (mirrored image, right half)
    pub fn left() -> Self {
        Self {
            name: "left".to_string(),
            polygon: vec![(0.6, 0.4), (1.0, 0.4), (1.0, 0.8), (0.6, 0.8)],
        }
    }

    /// Right blind spot on the rear camera (mirrored image, left half)
    pub fn right() -> Self {
        Self {
            name: "right".to_string(),
            polygon: vec![(0.0, 0.4), (0.4, 0.4), (0.4, 0.8), (0.0, 0.8)],
        }
    }

    /// Default regions in iteration order
    pub fn defaults() -> Vec<Self> {
        vec![Self::left(), Self::right()]
    }

    /// Check the polygon has at least three vertices inside the unit square
    pub fn validate(&self) -> Result<(), AdasError> {
        if self.polygon.len() < 3 {
            return Err(AdasError::InvalidRegion {
                name: self.name.clone(),
                reason: format!("needs at least 3 vertices, got {}", self.polygon.len()),
            });
        }
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if let Some(p) = self.polygon.iter().find(|(x, y)| !in_unit(*x) || !in_unit(*y)) {
            return Err(AdasError::InvalidRegion {
                name: self.name.clone(),
                reason: format!("vertex {:?} outside normalized coordinates", p),
            });
        }
        Ok(())
    }

    /// Ray-casting point-in-polygon test
    pub fn contains(&self, (x, y): (f64, f64)) -> bool {
        let points = &self.polygon;
        if points.len() < 3 {
            return false;
        }

        let mut inside = false;
        let mut j = points.len() - 1;
        for i in 0..points.len() {
            let (xi, yi) = points[i];
            let (xj, yj) = points[j];
            if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    /// First region containing the point, in iteration order
    pub fn locate(regions: &[BlindSpotRegion], point: (f64, f64)) -> Option<&BlindSpotRegion> {
        regions.iter().find(|region| region.contains(point))
    }
}
