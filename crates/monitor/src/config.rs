//! Layered monitor configuration

use adas::BlindSpotConfig;
use alerting::AlertThresholds;
use config::{Config, Environment, File};
use dms::DrivingScorerConfig;
use event_fusion::FusionConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::MonitorError;

/// Environment variable prefix, e.g. `DRIVER_MONITOR__QUEUES__VISUAL=8`
pub const ENV_PREFIX: &str = "DRIVER_MONITOR";

/// Bounded queue capacities
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub visual: usize,
    pub audio: usize,
    pub driving: usize,
    /// Published driver states kept for `drain_results`
    pub results: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            visual: 5,
            audio: 3,
            driving: 10,
            results: 10,
        }
    }
}

/// Producer cadences (ms between `produce` calls)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CadenceConfig {
    pub visual_ms: u64,
    pub audio_ms: u64,
    pub driving_ms: u64,
    /// Pause after a failed `produce`
    pub backoff_ms: u64,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            visual_ms: 100,
            audio_ms: 3000,
            driving_ms: 500,
            backoff_ms: 100,
        }
    }
}

/// Fusion loop timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionLoopConfig {
    /// Wait for a visual snapshot before skipping the cycle
    pub visual_timeout_ms: u64,
    /// Wait for a driving snapshot before treating it as unavailable
    pub driving_timeout_ms: u64,
    /// Bound on each join during shutdown
    pub join_timeout_ms: u64,
}

impl Default for FusionLoopConfig {
    fn default() -> Self {
        Self {
            visual_timeout_ms: 1000,
            driving_timeout_ms: 100,
            join_timeout_ms: 2000,
        }
    }
}

impl FusionLoopConfig {
    pub fn visual_timeout(&self) -> Duration {
        Duration::from_millis(self.visual_timeout_ms)
    }

    pub fn driving_timeout(&self) -> Duration {
        Duration::from_millis(self.driving_timeout_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

/// Log output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Maximum level (`trace`, `debug`, `info`, `warn`, `error`)
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete monitor configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub queues: QueueConfig,
    pub cadence: CadenceConfig,
    pub fusion_loop: FusionLoopConfig,
    pub fusion: FusionConfig,
    pub thresholds: AlertThresholds,
    pub driving: DrivingScorerConfig,
    pub blind_spot: BlindSpotConfig,
    pub logging: LoggingConfig,
}

impl MonitorConfig {
    /// Load defaults, then an optional file, then `DRIVER_MONITOR__*`
    /// environment overrides.
    pub fn load(path: Option<&str>) -> Result<Self, MonitorError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(false));
        }
        let config: MonitorConfig = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MonitorError> {
        self.fusion.validate()?;
        self.thresholds.validate()?;
        self.blind_spot.validate()?;

        let q = &self.queues;
        if q.visual == 0 || q.audio == 0 || q.driving == 0 || q.results == 0 {
            return Err(MonitorError::InvalidConfig(format!(
                "queue capacities must be positive: {q:?}"
            )));
        }
        if self.fusion_loop.visual_timeout_ms == 0 {
            return Err(MonitorError::InvalidConfig("visual timeout must be positive".into()));
        }
        Ok(())
    }
}
