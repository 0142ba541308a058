//! Road camera frames and the camera collaborator contract

use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};
use tracing::debug;

use crate::AdasError;

/// Decoded RGB frame from the rear/side camera
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoadFrame {
    /// RGB pixel data (width * height * 3), may be empty for synthetic frames
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Capture timestamp (ms since Unix epoch)
    pub timestamp_ms: u64,
    /// Frame sequence number
    pub sequence: u64,
}

impl RoadFrame {
    /// Create a new frame from raw RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp_ms: u64, sequence: u64) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ms,
            sequence,
        }
    }

    /// Normalize a pixel-space box (x1, y1, x2, y2) to [0,1] coordinates
    pub fn normalize_box(&self, (x1, y1, x2, y2): (f64, f64, f64, f64)) -> (f64, f64, f64, f64) {
        let w = self.width.max(1) as f64;
        let h = self.height.max(1) as f64;
        (x1 / w, y1 / h, x2 / w, y2 / h)
    }
}

/// Camera feeding the blind-spot loop
pub trait FrameSource: Send {
    /// Acquire the camera. Failure aborts startup.
    fn open(&mut self) -> Result<(), AdasError> {
        Ok(())
    }

    /// Capture the next frame, `None` if none is ready
    fn capture(&mut self) -> Result<Option<RoadFrame>, AdasError>;

    /// Release the camera
    fn release(&mut self) {}
}

impl<F: FrameSource + ?Sized> FrameSource for Box<F> {
    fn open(&mut self) -> Result<(), AdasError> {
        (**self).open()
    }

    fn capture(&mut self) -> Result<Option<RoadFrame>, AdasError> {
        (**self).capture()
    }

    fn release(&mut self) {
        (**self).release()
    }
}

/// Opened camera, released when dropped (including during unwinding)
pub struct CameraGuard<F: FrameSource> {
    camera: F,
}

impl<F: FrameSource> CameraGuard<F> {
    /// Open the camera; on failure nothing is held
    pub fn acquire(mut camera: F) -> Result<Self, AdasError> {
        camera.open()?;
        Ok(Self { camera })
    }
}

impl<F: FrameSource> Deref for CameraGuard<F> {
    type Target = F;

    fn deref(&self) -> &F {
        &self.camera
    }
}

impl<F: FrameSource> DerefMut for CameraGuard<F> {
    fn deref_mut(&mut self) -> &mut F {
        &mut self.camera
    }
}

impl<F: FrameSource> Drop for CameraGuard<F> {
    fn drop(&mut self) {
        self.camera.release();
        debug!("Blind-spot camera released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct TrackedCamera {
        fail_open: bool,
        released: Arc<AtomicBool>,
    }

    impl FrameSource for TrackedCamera {
        fn open(&mut self) -> Result<(), AdasError> {
            if self.fail_open {
                Err(AdasError::CameraUnavailable("/dev/video1".into()))
            } else {
                Ok(())
            }
        }

        fn capture(&mut self) -> Result<Option<RoadFrame>, AdasError> {
            Ok(None)
        }

        fn release(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let released = Arc::new(AtomicBool::new(false));
        let guard = CameraGuard::acquire(TrackedCamera {
            fail_open: false,
            released: released.clone(),
        })
        .unwrap();
        drop(guard);
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_failed_open_holds_nothing() {
        let released = Arc::new(AtomicBool::new(false));
        let result = CameraGuard::acquire(TrackedCamera {
            fail_open: true,
            released: released.clone(),
        });
        assert!(matches!(result, Err(AdasError::CameraUnavailable(_))));
        assert!(!released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_normalize_box() {
        let frame = RoadFrame::new(vec![], 640, 480, 0, 1);
        let (x1, y1, x2, y2) = frame.normalize_box((320.0, 240.0, 640.0, 480.0));
        assert_eq!((x1, y1, x2, y2), (0.5, 0.5, 1.0, 1.0));
    }
}
