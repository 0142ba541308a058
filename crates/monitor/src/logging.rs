//! Tracing subscriber setup

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::config::LoggingConfig;

/// Parse a level name, falling back to INFO
pub fn parse_level(level: &str) -> Level {
    level.trim().parse().unwrap_or(Level::INFO)
}

/// Install the global subscriber. Returns false if one was already set.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let level = parse_level(&config.level);
    let result = if config.json {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(true)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    };
    result.is_ok()
}
