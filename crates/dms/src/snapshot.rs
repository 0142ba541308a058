//! Per-modality score snapshots

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::state::StateDistribution;

/// Independent sensing channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// Cabin camera (face, eyes, expression)
    Visual,
    /// Cabin microphone (voice, tone)
    Audio,
    /// Vehicle telemetry (steering, lane keeping, speed)
    Driving,
    /// Rear/side camera object detections
    BlindSpot,
}

impl Modality {
    /// Get string representation
    pub fn as_str(self) -> &'static str {
        match self {
            Modality::Visual => "visual",
            Modality::Audio => "audio",
            Modality::Driving => "driving",
            Modality::BlindSpot => "blind_spot",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One modality's scores at capture time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalitySnapshot {
    /// Producing modality
    pub modality: Modality,

    /// Score distribution (empty when unavailable)
    pub distribution: StateDistribution,

    /// Capture timestamp (ms since Unix epoch)
    pub timestamp_ms: u64,

    /// Whether the modality could observe the driver (e.g. face detected)
    pub available: bool,
}

impl ModalitySnapshot {
    /// Snapshot carrying scores
    pub fn new(modality: Modality, distribution: StateDistribution) -> Self {
        let available = !distribution.is_empty();
        Self {
            modality,
            distribution,
            timestamp_ms: now_ms(),
            available,
        }
    }

    /// Snapshot for a cycle where the modality saw nothing usable
    pub fn unavailable(modality: Modality) -> Self {
        Self {
            modality,
            distribution: StateDistribution::empty(),
            timestamp_ms: now_ms(),
            available: false,
        }
    }

    /// Override the capture timestamp
    pub fn with_timestamp(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    /// Distribution to fuse, if this snapshot contributes anything
    pub fn contribution(&self) -> Option<&StateDistribution> {
        if self.available && !self.distribution.is_empty() {
            Some(&self.distribution)
        } else {
            None
        }
    }
}

/// Milliseconds since the Unix epoch
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
