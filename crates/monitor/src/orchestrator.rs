//! Producers, fusion loop and published driver state

use adas::{BlindSpotMonitor, CameraGuard, FrameSource, ObjectDetector};
use alerting::DriverState;
use dms::{Modality, ModalityScoreSource, ModalitySnapshot, SourceGuard};
use event_fusion::WeightPresets;
use ring_buffer::RingBuffer;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::{FusionLoopConfig, MonitorConfig};
use crate::pipeline::FusionPipeline;
use crate::queue::{snapshot_queue, SnapshotSender};
use crate::worker::Worker;
use crate::MonitorError;

/// Longest uninterrupted sleep in a producer before re-checking stop
const STOP_POLL: Duration = Duration::from_millis(50);

type BoxedSource = Box<dyn ModalityScoreSource>;

struct BlindSpotUnit {
    monitor: Arc<BlindSpotMonitor>,
    camera: Box<dyn FrameSource>,
    detector: Box<dyn ObjectDetector>,
}

/// Collects sources before starting the orchestrator
pub struct OrchestratorBuilder {
    config: MonitorConfig,
    visual: Option<BoxedSource>,
    audio: Option<BoxedSource>,
    driving: Option<BoxedSource>,
    blind_spot: Option<BlindSpotUnit>,
}

impl OrchestratorBuilder {
    /// Cabin camera scorer (required)
    pub fn visual(mut self, source: impl ModalityScoreSource + 'static) -> Self {
        self.visual = Some(Box::new(source));
        self
    }

    /// Microphone scorer
    pub fn audio(mut self, source: impl ModalityScoreSource + 'static) -> Self {
        self.audio = Some(Box::new(source));
        self
    }

    /// Telemetry scorer
    pub fn driving(mut self, source: impl ModalityScoreSource + 'static) -> Self {
        self.driving = Some(Box::new(source));
        self
    }

    /// Run the blind-spot loop alongside, escalating against the
    /// published driver state
    pub fn blind_spot(
        mut self,
        monitor: Arc<BlindSpotMonitor>,
        camera: impl FrameSource + 'static,
        detector: impl ObjectDetector + 'static,
    ) -> Self {
        self.blind_spot = Some(BlindSpotUnit {
            monitor,
            camera: Box::new(camera),
            detector: Box::new(detector),
        });
        self
    }

    /// Open every device and start all loops. Must be called from within
    /// a tokio runtime.
    pub fn start(self) -> Result<Orchestrator, MonitorError> {
        let OrchestratorBuilder {
            config,
            visual,
            audio,
            driving,
            blind_spot,
        } = self;

        config
            .validate()
            .map_err(|e| MonitorError::Startup(format!("invalid configuration: {e}")))?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| MonitorError::Startup(format!("no tokio runtime: {e}")))?;
        let pipeline = FusionPipeline::new(&config.fusion, config.thresholds)
            .map_err(|e| MonitorError::Startup(e.to_string()))?;

        let visual = visual.ok_or_else(|| MonitorError::Startup("visual source required".into()))?;

        // Open everything before spawning; a failure drops (and releases)
        // whatever was already opened.
        let visual = open_source(Modality::Visual, visual)?;
        let audio = audio.map(|s| open_source(Modality::Audio, s)).transpose()?;
        let driving = driving.map(|s| open_source(Modality::Driving, s)).transpose()?;
        let blind_spot = blind_spot
            .map(|unit| {
                CameraGuard::acquire(unit.camera)
                    .map(|camera| (unit.monitor, camera, unit.detector))
                    .map_err(|e| MonitorError::Startup(format!("blind-spot camera: {e}")))
            })
            .transpose()?;

        let queues = &config.queues;
        let (visual_tx, visual_rx) = snapshot_queue(Modality::Visual, queues.visual);
        let (audio_tx, audio_rx) = snapshot_queue(Modality::Audio, queues.audio);
        let (driving_tx, driving_rx) = snapshot_queue(Modality::Driving, queues.driving);
        let queue_drops = vec![
            (Modality::Visual, visual_tx.drop_counter()),
            (Modality::Audio, audio_tx.drop_counter()),
            (Modality::Driving, driving_tx.drop_counter()),
        ];

        let (state_tx, state_rx) = watch::channel(Arc::new(DriverState::unknown()));
        let results = Arc::new(RingBuffer::drop_oldest(queues.results));
        let stop = Arc::new(AtomicBool::new(false));
        let engine = pipeline.engine();

        let cadence = &config.cadence;
        let backoff = Duration::from_millis(cadence.backoff_ms);
        let producers = [
            (Some(visual), visual_tx, cadence.visual_ms),
            (audio, audio_tx, cadence.audio_ms),
            (driving, driving_tx, cadence.driving_ms),
        ];

        let mut workers = Vec::new();
        let spawned = (|| {
            for (source, queue, period_ms) in producers {
                let Some(source) = source else { continue };
                let name = format!("{}-producer", queue.modality());
                let stop = stop.clone();
                let period = Duration::from_millis(period_ms);
                workers.push(Worker::spawn(name, move || {
                    run_producer(source, queue, period, backoff, &stop)
                })?);
            }

            if let Some((monitor, camera, detector)) = blind_spot {
                monitor.set_driver_state_provider(Arc::new(state_rx.clone()));
                let stop = stop.clone();
                workers.push(Worker::spawn("blind-spot", move || {
                    monitor.run_guarded(camera, detector, &stop)
                })?);
            }
            Ok::<_, MonitorError>(())
        })();
        if let Err(e) = spawned {
            stop.store(true, Ordering::SeqCst);
            return Err(e);
        }

        let fusion = FusionLoop {
            pipeline,
            visual: visual_rx,
            audio: audio_rx,
            driving: driving_rx,
            publisher: state_tx,
            results: results.clone(),
            timing: config.fusion_loop.clone(),
            stop: stop.clone(),
        };
        let fusion = runtime.spawn(fusion.run());

        info!("Driver monitor started with {} worker threads", workers.len());

        Ok(Orchestrator {
            stop,
            workers,
            fusion: Some(fusion),
            state_rx,
            results,
            engine,
            queue_drops,
            join_timeout: config.fusion_loop.join_timeout(),
        })
    }
}

fn open_source(
    expected: Modality,
    source: BoxedSource,
) -> Result<SourceGuard<BoxedSource>, MonitorError> {
    if source.modality() != expected {
        return Err(MonitorError::Startup(format!(
            "{} source registered as {}",
            source.modality(),
            expected
        )));
    }
    SourceGuard::acquire(source).map_err(|e| MonitorError::Startup(format!("{expected} source: {e}")))
}

/// Outcome of a shutdown
#[derive(Debug, Default, Clone)]
pub struct ShutdownReport {
    pub stopped: Vec<String>,
    pub timed_out: Vec<String>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.timed_out.is_empty()
    }
}

/// Running driver monitor.
///
/// The latest `DriverState` is replaced as a whole each fusion cycle;
/// readers never observe a partially updated value.
pub struct Orchestrator {
    stop: Arc<AtomicBool>,
    workers: Vec<Worker>,
    fusion: Option<JoinHandle<()>>,
    state_rx: watch::Receiver<Arc<DriverState>>,
    results: Arc<RingBuffer<Arc<DriverState>>>,
    engine: Arc<event_fusion::FusionEngine>,
    queue_drops: Vec<(Modality, Arc<AtomicUsize>)>,
    join_timeout: Duration,
}

impl Orchestrator {
    pub fn builder(config: MonitorConfig) -> OrchestratorBuilder {
        OrchestratorBuilder {
            config,
            visual: None,
            audio: None,
            driving: None,
            blind_spot: None,
        }
    }

    /// Last published state, or "unknown" before the first fusion cycle
    pub fn current_state(&self) -> Arc<DriverState> {
        self.state_rx.borrow().clone()
    }

    /// Receiver notified on every published state
    pub fn subscribe(&self) -> watch::Receiver<Arc<DriverState>> {
        self.state_rx.clone()
    }

    /// Take every state in the result queue, oldest first
    pub fn drain_results(&self) -> Vec<Arc<DriverState>> {
        self.results.drain()
    }

    /// States evicted from the result queue so far
    pub fn results_dropped(&self) -> usize {
        self.results.dropped()
    }

    /// Snapshots dropped on a full modality queue
    pub fn queue_dropped(&self, modality: Modality) -> usize {
        self.queue_drops
            .iter()
            .find(|(m, _)| *m == modality)
            .map_or(0, |(_, count)| count.load(Ordering::Relaxed))
    }

    /// Atomically replace the reliability weight presets
    pub fn set_weight_presets(&self, presets: WeightPresets) -> Result<(), MonitorError> {
        self.engine.set_presets(presets)?;
        info!("Reliability weight presets updated");
        Ok(())
    }

    /// Signal every loop to stop and wait (bounded) for each of them.
    /// Units that miss the deadline are logged and left behind.
    pub async fn shutdown(mut self) -> ShutdownReport {
        info!("Stopping driver monitor");
        self.stop.store(true, Ordering::SeqCst);
        let mut report = ShutdownReport::default();

        if let Some(mut fusion) = self.fusion.take() {
            match timeout(self.join_timeout, &mut fusion).await {
                Ok(_) => report.stopped.push("fusion-loop".to_string()),
                Err(_) => {
                    fusion.abort();
                    let err = MonitorError::ShutdownTimeout {
                        unit: "fusion-loop".to_string(),
                        timeout_ms: self.join_timeout.as_millis() as u64,
                    };
                    error!("{}", err);
                    report.timed_out.push("fusion-loop".to_string());
                }
            }
        }

        for worker in std::mem::take(&mut self.workers) {
            let name = worker.name().to_string();
            match worker.join(self.join_timeout).await {
                Ok(()) => report.stopped.push(name),
                Err(_) => report.timed_out.push(name),
            }
        }

        info!(
            "Driver monitor stopped ({} clean, {} timed out)",
            report.stopped.len(),
            report.timed_out.len()
        );
        report
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

/// Producer loop for one modality. The guard releases the device on every
/// exit path, including a panic inside `produce`.
fn run_producer(
    mut source: SourceGuard<BoxedSource>,
    queue: SnapshotSender,
    period: Duration,
    backoff: Duration,
    stop: &AtomicBool,
) {
    let modality = queue.modality();
    info!("{} producer started ({}ms cadence)", modality, period.as_millis());

    while !stop.load(Ordering::SeqCst) {
        let started = Instant::now();

        match catch_unwind(AssertUnwindSafe(|| source.produce())) {
            Ok(Ok(Some(snapshot))) => {
                queue.offer(snapshot);
            }
            Ok(Ok(None)) => {}
            Ok(Err(e)) => {
                warn!("{} source failed: {}", modality, e);
                metrics::counter!("dms_source_failures_total", "modality" => modality.as_str())
                    .increment(1);
                sleep_unless_stopped(backoff, stop);
                continue;
            }
            Err(_) => {
                error!("{} source panicked, stopping producer", modality);
                metrics::counter!("dms_source_failures_total", "modality" => modality.as_str())
                    .increment(1);
                break;
            }
        }

        sleep_unless_stopped(period.saturating_sub(started.elapsed()), stop);
    }

    info!("{} producer stopped", modality);
}

fn sleep_unless_stopped(total: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + total;
    loop {
        if stop.load(Ordering::SeqCst) {
            return;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return;
        }
        std::thread::sleep(remaining.min(STOP_POLL));
    }
}

struct FusionLoop {
    pipeline: FusionPipeline,
    visual: mpsc::Receiver<ModalitySnapshot>,
    audio: mpsc::Receiver<ModalitySnapshot>,
    driving: mpsc::Receiver<ModalitySnapshot>,
    publisher: watch::Sender<Arc<DriverState>>,
    results: Arc<RingBuffer<Arc<DriverState>>>,
    timing: FusionLoopConfig,
    stop: Arc<AtomicBool>,
}

impl FusionLoop {
    async fn run(mut self) {
        info!("Fusion loop started");
        let mut visual_closed = false;

        while !self.stop.load(Ordering::SeqCst) {
            // Visual is the primary modality: no sample, no cycle
            let visual = match timeout(self.timing.visual_timeout(), self.visual.recv()).await {
                Ok(Some(snapshot)) => snapshot,
                Ok(None) => {
                    if !visual_closed {
                        warn!("Visual producer gone, fusion cycles will be skipped");
                        visual_closed = true;
                    }
                    metrics::counter!("dms_fusion_skipped_total").increment(1);
                    tokio::time::sleep(self.timing.visual_timeout()).await;
                    continue;
                }
                Err(_) => {
                    debug!("No visual snapshot within timeout, skipping cycle");
                    metrics::counter!("dms_fusion_skipped_total").increment(1);
                    continue;
                }
            };

            let driving = timeout(self.timing.driving_timeout(), self.driving.recv())
                .await
                .ok()
                .flatten();
            let audio = self.audio.try_recv().ok();

            let state = self
                .pipeline
                .cycle(Some(&visual), audio.as_ref(), driving.as_ref());
            self.publish(Arc::new(state));
        }

        info!("Fusion loop stopped");
    }

    fn publish(&self, state: Arc<DriverState>) {
        metrics::counter!("dms_fusion_cycles_total").increment(1);
        debug!("{}", state.summary());
        self.results.push(state.clone());
        self.publisher.send_replace(state);
    }
}
