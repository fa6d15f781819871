//! Structured logging with tracing
//!
//! Installs the global `tracing` subscriber. The `COREKIT_LOG` environment
//! variable, when set, overrides the configured level filter.

use crate::config::{ConfigError, LoggingConfig};
use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_ENV: &str = "COREKIT_LOG";

/// Initialize logging with the provided configuration
///
/// Fails if the level is unknown or a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), ConfigError> {
    let level = parse_log_level(&config.level)?;
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| level_filter(level));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(true))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .try_init()
    };
    installed.map_err(|e| ConfigError::Logging(e.to_string()))?;

    tracing::info!("Logging initialized with level: {}", level);
    Ok(())
}

fn level_filter(level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .parse_lossy("")
}

/// Parse log level string to tracing Level
pub fn parse_log_level(level: &str) -> Result<Level, ConfigError> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(ConfigError::Invalid {
            key: "log level".to_string(),
            message: format!("{level}: use trace, debug, info, warn, or error"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("DEBUG").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level("warning").unwrap(), Level::WARN);
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn test_level_filter_from_alias() {
        let level = parse_log_level("warning").unwrap();
        assert_eq!(level_filter(level).max_level_hint(), Some(LevelFilter::WARN));
        assert_eq!(level_filter(Level::DEBUG).max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn test_init_rejects_unknown_level() {
        let config = LoggingConfig {
            level: "loud".to_string(),
            json: false,
        };
        assert!(matches!(init_logging(&config), Err(ConfigError::Invalid { .. })));
    }
}
