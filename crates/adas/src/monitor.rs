//! Blind-spot detection loop

use parking_lot::RwLock;
use ring_buffer::RingBuffer;
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::BlindSpotConfig;
use crate::escalation::{DriverStateProvider, EscalatedWarning, EscalationPolicy};
use crate::frame::{CameraGuard, FrameSource, RoadFrame};
use crate::object::{Detection, ObjectDetector};
use crate::threat::{ThreatAlert, ThreatAssessor};
use crate::AdasError;

/// Callback invoked synchronously with each alert
pub type AlertHandler = Arc<dyn Fn(&ThreatAlert) + Send + Sync>;

/// Callback invoked with each escalated warning
pub type EscalationHandler = Arc<dyn Fn(&EscalatedWarning) + Send + Sync>;

/// Point-in-time view of the monitor
#[derive(Debug, Clone, Default, Serialize)]
pub struct BlindSpotStatus {
    pub running: bool,
    /// Detections in the last processed frame
    pub detections: usize,
    /// Alerts raised by the last processed frame
    pub active_alerts: usize,
    pub alerts: Vec<ThreatAlert>,
}

/// Blind-spot monitor
///
/// Shared by reference: the detection loop runs on one thread while status
/// queries and handler registration happen from others.
pub struct BlindSpotMonitor {
    assessor: ThreatAssessor,
    escalation: EscalationPolicy,
    alert_handlers: RwLock<Vec<AlertHandler>>,
    escalation_handlers: RwLock<Vec<EscalationHandler>>,
    driver_state: RwLock<Option<Arc<dyn DriverStateProvider>>>,
    history: RingBuffer<ThreatAlert>,
    current_alerts: RwLock<Vec<ThreatAlert>>,
    running: AtomicBool,
    last_detections: AtomicUsize,
    frames_seen: AtomicU64,
}

impl BlindSpotMonitor {
    /// Create a monitor with a validated configuration
    pub fn new(config: BlindSpotConfig) -> Result<Self, AdasError> {
        config.validate()?;
        info!(
            "Creating blind-spot monitor: {} regions, frame skip {}",
            config.regions.len(),
            config.frame_skip
        );
        let history = RingBuffer::drop_oldest(config.history_capacity);
        Ok(Self {
            assessor: ThreatAssessor::new(config),
            escalation: EscalationPolicy::default(),
            alert_handlers: RwLock::new(Vec::new()),
            escalation_handlers: RwLock::new(Vec::new()),
            driver_state: RwLock::new(None),
            history,
            current_alerts: RwLock::new(Vec::new()),
            running: AtomicBool::new(false),
            last_detections: AtomicUsize::new(0),
            frames_seen: AtomicU64::new(0),
        })
    }

    pub fn with_escalation_policy(mut self, policy: EscalationPolicy) -> Self {
        self.escalation = policy;
        self
    }

    pub fn assessor(&self) -> &ThreatAssessor {
        &self.assessor
    }

    pub fn config(&self) -> &BlindSpotConfig {
        self.assessor.config()
    }

    /// Register an alert handler
    pub fn on_alert<H>(&self, handler: H)
    where
        H: Fn(&ThreatAlert) + Send + Sync + 'static,
    {
        self.alert_handlers.write().push(Arc::new(handler));
    }

    /// Register an escalated-warning handler
    pub fn on_escalation<H>(&self, handler: H)
    where
        H: Fn(&EscalatedWarning) + Send + Sync + 'static,
    {
        self.escalation_handlers.write().push(Arc::new(handler));
    }

    /// Source of the latest driver state for escalation
    pub fn set_driver_state_provider(&self, provider: Arc<dyn DriverStateProvider>) {
        *self.driver_state.write() = Some(provider);
    }

    /// Assess a detection list. Returns the alerts raised, which also
    /// replace the active alerts reported by `status`.
    pub fn process_detections(&self, detections: &[Detection], timestamp_ms: u64) -> Vec<ThreatAlert> {
        let mut alerts = Vec::new();

        for detection in detections {
            if let Some(reason) = self.assessor.filter_reason(detection) {
                debug!("Filtered detection ({}): {}", reason.as_str(), detection.summary());
                metrics::counter!("blind_spot_filtered_total").increment(1);
                continue;
            }

            let score = self.assessor.score(detection);
            let alert = self.assessor.to_alert(detection, score, timestamp_ms);
            info!(
                "Blind-spot alert {} [{}] ({:.2}): {}",
                alert.level,
                alert.alert_type.as_str(),
                score,
                alert.message
            );
            metrics::counter!("blind_spot_alerts_total", "level" => alert.level.as_str()).increment(1);

            self.history.push(alert.clone());
            self.dispatch(&alert);
            self.escalate(&alert);
            alerts.push(alert);
        }

        *self.current_alerts.write() = alerts.clone();
        alerts
    }

    /// Run one frame through frame skipping, detection and assessment.
    /// Returns `None` for skipped frames.
    pub fn process_frame(
        &self,
        frame: &RoadFrame,
        detector: &mut dyn ObjectDetector,
    ) -> Option<Vec<ThreatAlert>> {
        let seen = self.frames_seen.fetch_add(1, Ordering::Relaxed) + 1;
        if seen % u64::from(self.config().frame_skip) != 0 {
            return None;
        }

        // Detector failures mean "no detections this frame"
        let mut detections = match detector.detect(frame) {
            Ok(detections) => detections,
            Err(e) => {
                warn!("Detector failed on frame {}: {}", frame.sequence, e);
                Vec::new()
            }
        };
        let threshold = self.config().detection_threshold;
        detections.retain(|d| d.confidence > threshold);
        self.last_detections.store(detections.len(), Ordering::Relaxed);

        Some(self.process_detections(&detections, frame.timestamp_ms))
    }

    /// Blocking detection loop; exits when `stop` is set.
    ///
    /// The camera is opened first and released on every exit path.
    pub fn run<F, D>(&self, camera: F, detector: D, stop: &AtomicBool) -> Result<(), AdasError>
    where
        F: FrameSource,
        D: ObjectDetector,
    {
        let camera = CameraGuard::acquire(camera)?;
        self.run_guarded(camera, detector, stop);
        Ok(())
    }

    /// Detection loop over an already opened camera
    pub fn run_guarded<F, D>(&self, mut camera: CameraGuard<F>, mut detector: D, stop: &AtomicBool)
    where
        F: FrameSource,
        D: ObjectDetector,
    {
        self.running.store(true, Ordering::SeqCst);
        info!("Blind-spot detection loop started");

        let delay = Duration::from_millis(self.config().loop_delay_ms);
        while !stop.load(Ordering::SeqCst) {
            match camera.capture() {
                Ok(Some(frame)) => {
                    self.process_frame(&frame, &mut detector);
                }
                Ok(None) => {}
                Err(e) => warn!("Blind-spot capture failed: {}", e),
            }
            std::thread::sleep(delay);
        }

        self.running.store(false, Ordering::SeqCst);
        info!("Blind-spot detection loop stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Alert history across frames, newest first
    pub fn recent_alerts(&self, count: usize) -> Vec<ThreatAlert> {
        self.history.read_last(count)
    }

    pub fn status(&self) -> BlindSpotStatus {
        let alerts = self.current_alerts.read().clone();
        BlindSpotStatus {
            running: self.is_running(),
            detections: self.last_detections.load(Ordering::Relaxed),
            active_alerts: alerts.len(),
            alerts,
        }
    }

    fn dispatch(&self, alert: &ThreatAlert) {
        let handlers = self.alert_handlers.read().clone();
        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(alert))).is_err() {
                error!("Alert handler panicked on: {}", alert.message);
                metrics::counter!("blind_spot_handler_panics_total").increment(1);
            }
        }
    }

    fn escalate(&self, alert: &ThreatAlert) {
        let Some(provider) = self.driver_state.read().clone() else {
            return;
        };
        let Some(warning) = self.escalation.evaluate(alert, provider.latest()) else {
            return;
        };

        warn!("{}", warning.summary());
        let handlers = self.escalation_handlers.read().clone();
        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(&warning))).is_err() {
                error!("Escalation handler panicked on: {}", warning.alert.message);
                metrics::counter!("blind_spot_handler_panics_total").increment(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{BoundingBox, VehicleType};
    use crate::simulated::{ScriptedDetector, SyntheticCamera};
    use crate::threat::ThreatLevel;
    use alerting::{AlertClassifier, DriverState};
    use dms::{DriverStateKind, StateDistribution};
    use parking_lot::Mutex;
    use tokio::sync::watch;

    fn close_semi() -> Detection {
        Detection::new(
            VehicleType::Semi,
            BoundingBox::new(0.65, 0.3, 0.75, 0.8),
            0.9,
            0.1,
            Some("left".into()),
        )
    }

    fn far_car() -> Detection {
        Detection::new(
            VehicleType::Car,
            BoundingBox::new(0.65, 0.45, 0.95, 0.75),
            0.9,
            0.31,
            Some("left".into()),
        )
    }

    #[test]
    fn test_process_detections_filters_and_records() {
        let monitor = BlindSpotMonitor::new(BlindSpotConfig::default()).unwrap();
        let alerts = monitor.process_detections(&[close_semi(), far_car()], 7);

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, ThreatLevel::High);
        assert_eq!(monitor.status().active_alerts, 1);
        assert_eq!(monitor.recent_alerts(5)[0].timestamp_ms, 7);
    }

    #[test]
    fn test_panicking_handler_is_isolated() {
        let monitor = BlindSpotMonitor::new(BlindSpotConfig::default()).unwrap();
        let seen = Arc::new(AtomicUsize::new(0));

        monitor.on_alert(|_| panic!("display offline"));
        let counter = seen.clone();
        monitor.on_alert(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        monitor.process_detections(&[close_semi()], 0);
        monitor.process_detections(&[close_semi()], 1);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_history_keeps_latest_alerts() {
        let monitor = BlindSpotMonitor::new(BlindSpotConfig::default()).unwrap();
        for ts in 0..15 {
            monitor.process_detections(&[close_semi()], ts);
        }
        let history = monitor.recent_alerts(20);
        assert_eq!(history.len(), 10);
        assert_eq!(history.first().map(|a| a.timestamp_ms), Some(14));
        assert_eq!(history.last().map(|a| a.timestamp_ms), Some(5));
        assert_eq!(monitor.status().active_alerts, 1);
    }

    #[test]
    fn test_frame_skip_and_detector_failure() {
        let monitor = BlindSpotMonitor::new(BlindSpotConfig::default()).unwrap();
        let mut detector = ScriptedDetector::new(vec![
            Ok(vec![close_semi()]),
            Err(AdasError::Detection("model not loaded".into())),
        ]);
        let frame = RoadFrame::new(vec![], 640, 480, 0, 0);

        assert!(monitor.process_frame(&frame, &mut detector).is_none());
        assert_eq!(monitor.process_frame(&frame, &mut detector).map(|a| a.len()), Some(1));
        assert!(monitor.process_frame(&frame, &mut detector).is_none());
        assert_eq!(monitor.process_frame(&frame, &mut detector), Some(vec![]));
        assert_eq!(monitor.status().detections, 0);
    }

    #[test]
    fn test_active_alerts_cleared_by_empty_frame() {
        let monitor = BlindSpotMonitor::new(BlindSpotConfig {
            frame_skip: 1,
            ..Default::default()
        })
        .unwrap();
        let mut detector = ScriptedDetector::new(vec![Ok(vec![close_semi()]), Ok(vec![])]);
        let frame = RoadFrame::new(vec![], 640, 480, 0, 0);

        assert_eq!(monitor.process_frame(&frame, &mut detector).map(|a| a.len()), Some(1));
        assert_eq!(monitor.status().active_alerts, 1);

        assert_eq!(monitor.process_frame(&frame, &mut detector), Some(vec![]));
        let status = monitor.status();
        assert_eq!(status.active_alerts, 0);
        assert!(status.alerts.is_empty());
        assert_eq!(status.detections, 0);
        assert_eq!(monitor.recent_alerts(10).len(), 1);
    }

    #[test]
    fn test_nan_detection_never_alerts() {
        let monitor = BlindSpotMonitor::new(BlindSpotConfig::default()).unwrap();
        let mut far = close_semi();
        far.distance = f64::NAN;
        let mut unsure = close_semi();
        unsure.confidence = f64::NAN;

        assert!(monitor.process_detections(&[far, unsure], 0).is_empty());
        let sanitized = Detection::new(
            VehicleType::Car,
            BoundingBox::new(0.65, 0.45, 0.95, 0.75),
            0.9,
            f64::NAN,
            Some("left".into()),
        );
        assert!(monitor.process_detections(&[sanitized], 1).is_empty());
        assert_eq!(monitor.status().active_alerts, 0);
    }

    #[test]
    fn test_confidence_prefilter() {
        let monitor = BlindSpotMonitor::new(BlindSpotConfig {
            frame_skip: 1,
            ..Default::default()
        })
        .unwrap();
        let mut weak = close_semi();
        weak.confidence = 0.5;
        let mut detector = ScriptedDetector::new(vec![Ok(vec![weak, close_semi()])]);
        let frame = RoadFrame::new(vec![], 640, 480, 0, 0);

        let alerts = monitor.process_frame(&frame, &mut detector).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(monitor.status().detections, 1);
    }

    #[test]
    fn test_escalation_reads_published_state() {
        let monitor = BlindSpotMonitor::new(BlindSpotConfig::default()).unwrap();
        let (tx, rx) = watch::channel(Arc::new(DriverState::unknown()));
        monitor.set_driver_state_provider(Arc::new(rx));

        let escalations = Arc::new(Mutex::new(Vec::new()));
        let sink = escalations.clone();
        monitor.on_escalation(move |w| sink.lock().push(w.clone()));

        monitor.process_detections(&[close_semi()], 0);
        assert!(escalations.lock().is_empty());

        let drowsy = AlertClassifier::default().classify(&StateDistribution::certain(DriverStateKind::Drowsy));
        tx.send_replace(Arc::new(drowsy));
        monitor.process_detections(&[close_semi()], 1);

        let escalations = escalations.lock();
        assert_eq!(escalations.len(), 1);
        assert_eq!(escalations[0].alert.timestamp_ms, 1);
        // the published state is never written back
        assert!(tx.borrow().is_inattentive());
    }

    #[test]
    fn test_run_stops_and_releases_camera() {
        let monitor = Arc::new(
            BlindSpotMonitor::new(BlindSpotConfig {
                frame_skip: 1,
                loop_delay_ms: 1,
                ..Default::default()
            })
            .unwrap(),
        );
        let stop = Arc::new(AtomicBool::new(false));
        let released = Arc::new(AtomicBool::new(false));
        let camera = SyntheticCamera::new(64, 48).track_release(released.clone());
        let detector = ScriptedDetector::repeating(vec![close_semi()]);

        let handle = {
            let monitor = monitor.clone();
            let stop = stop.clone();
            std::thread::spawn(move || monitor.run(camera, detector, &stop))
        };

        while monitor.recent_alerts(10).len() < 3 {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(monitor.is_running());
        stop.store(true, Ordering::SeqCst);
        handle.join().unwrap().unwrap();

        assert!(!monitor.is_running());
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_run_fails_when_camera_cannot_open() {
        let monitor = BlindSpotMonitor::new(BlindSpotConfig::default()).unwrap();
        let stop = AtomicBool::new(false);
        let camera = SyntheticCamera::new(64, 48).failing_open();
        let result = monitor.run(camera, ScriptedDetector::new(vec![]), &stop);
        assert!(matches!(result, Err(AdasError::CameraUnavailable(_))));
    }
}
