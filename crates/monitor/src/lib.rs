//! Driver Monitoring Orchestrator
//!
//! Runs one producer per modality, a fusion loop turning the latest
//! snapshots into a published `DriverState`, and optionally the
//! blind-spot detection loop cross-referenced with that state.

pub mod config;
pub mod logging;
pub mod orchestrator;
pub mod pipeline;
pub mod queue;
pub mod worker;

pub use config::{CadenceConfig, FusionLoopConfig, LoggingConfig, MonitorConfig, QueueConfig};
pub use logging::init_logging;
pub use orchestrator::{Orchestrator, OrchestratorBuilder, ShutdownReport};
pub use pipeline::FusionPipeline;
pub use queue::{snapshot_queue, SnapshotSender};
pub use worker::Worker;

use adas::AdasError;
use alerting::AlertError;
use event_fusion::FusionError;
use thiserror::Error;

/// Monitor error types
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Startup failed: {0}")]
    Startup(String),

    #[error("{unit} did not stop within {timeout_ms}ms")]
    ShutdownTimeout { unit: String, timeout_ms: u64 },

    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Fusion(#[from] FusionError),

    #[error(transparent)]
    Alert(#[from] AlertError),

    #[error(transparent)]
    Adas(#[from] AdasError),
}
