//! Driver Monitor - Main Entry Point
//!
//! Runs the full pipeline against simulated devices. Pass a config file
//! path as the first argument; `DRIVER_MONITOR__*` variables override it.

use adas::{BlindSpotMonitor, SimulatedDetector, SyntheticCamera};
use dms::{Modality, SimulatedDrivingSource, SimulatedSource};
use monitor::{init_logging, MonitorConfig, Orchestrator};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1);
    let config = MonitorConfig::load(config_path.as_deref())?;
    if !init_logging(&config.logging) {
        warn!("Tracing subscriber already installed; logging config ignored");
    }

    info!("=== Driver Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    let blind_spot = Arc::new(BlindSpotMonitor::new(config.blind_spot.clone())?);
    blind_spot.on_alert(|alert| info!("BLIND SPOT ALERT: {}", alert.message));
    blind_spot.on_escalation(|warning| warn!("{}", warning.summary()));

    let orchestrator = Orchestrator::builder(config.clone())
        .visual(SimulatedSource::new(Modality::Visual).with_miss_probability(0.1))
        .audio(SimulatedSource::new(Modality::Audio))
        .driving(SimulatedDrivingSource::new(config.driving.clone()))
        .blind_spot(
            blind_spot.clone(),
            SyntheticCamera::new(640, 480),
            SimulatedDetector::new(config.blind_spot.regions.clone()),
        )
        .start()?;

    let mut states = orchestrator.subscribe();
    let mut last_level = None;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received");
                break;
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                if last_level != Some(state.alert_level) {
                    info!("{}", state.summary());
                    last_level = Some(state.alert_level);
                }
            }
        }
    }

    let status = blind_spot.status();
    info!(
        "Blind spot: {} active alerts, {} detections in last frame",
        status.active_alerts, status.detections
    );

    info!(
        "Final state: {}",
        serde_json::to_string(&*orchestrator.current_state())?
    );

    let report = orchestrator.shutdown().await;
    if !report.is_clean() {
        warn!("Units still running at exit: {:?}", report.timed_out);
    }
    Ok(())
}
