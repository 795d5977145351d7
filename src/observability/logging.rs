//! Logging with a runtime-adjustable threshold.

use crate::error::{ConfigError, Result};
use std::str::FromStr;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{Registry, fmt, reload};

/// Something that can change the process log threshold.
pub trait LoggingClient: Send + Sync {
    /// Set the threshold from a level name such as `INFO` or `debug`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidLogLevel`] for unknown names.
    fn set_log_level(&self, level: &str) -> Result<()>;
}

/// Parse a level name, case-insensitively.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidLogLevel`] for unknown names.
pub fn parse_level(level: &str) -> Result<LevelFilter> {
    LevelFilter::from_str(level.trim()).map_err(|_| ConfigError::InvalidLogLevel(level.to_string()))
}

/// A [`LoggingClient`] backed by a `tracing-subscriber` reload layer.
#[derive(Clone)]
pub struct TracingLogLevel {
    handle: reload::Handle<LevelFilter, Registry>,
}

impl LoggingClient for TracingLogLevel {
    fn set_log_level(&self, level: &str) -> Result<()> {
        let filter = parse_level(level)?;
        self.handle
            .reload(filter)
            .map_err(|e| ConfigError::InvalidLogLevel(format!("{}: {}", level, e)))?;
        info!(level = %filter, "Log level set");
        Ok(())
    }
}

/// Install the global subscriber with `initial_level` and return a handle to change it.
///
/// # Errors
///
/// Returns an error if the level is unknown or a global subscriber is already set.
pub fn init_logging(initial_level: &str) -> Result<TracingLogLevel> {
    let (filter, handle) = reload::Layer::new(parse_level(initial_level)?);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .map_err(|e| ConfigError::InvalidLogLevel(format!("failed to install subscriber: {}", e)))?;
    Ok(TracingLogLevel { handle })
}

/// A [`LoggingClient`] that only validates the level name.
///
/// Useful when the host application owns the subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogging;

impl LoggingClient for NoopLogging {
    fn set_log_level(&self, level: &str) -> Result<()> {
        parse_level(level).map(|_| ())
    }
}
