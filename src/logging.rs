//! # Logging Setup
//!
//! Installs the global `tracing` subscriber: formatted output on stdout and,
//! when a directory is configured, a daily rolling log file written through a
//! non-blocking worker.
//!
//! `RUST_LOG` takes precedence over the configured level.

use std::fs;

use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::Result;

/// Log file name prefix inside the log directory
pub const LOG_FILE_PREFIX: &str = "vr-dsu-bridge.log";

/// Parse a configured level name, falling back to INFO
pub fn parse_level(level: &str) -> LevelFilter {
    level.trim().parse().unwrap_or(LevelFilter::INFO)
}

/// Build the filter: `RUST_LOG` directives over the configured default level
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(parse_level(level).into())
        .from_env_lossy()
}

/// Install the global subscriber.
///
/// The returned guard flushes the log file on drop and must be held for the
/// lifetime of the process.
///
/// # Errors
///
/// Returns `Io` if the log directory cannot be created.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let (file_layer, guard) = if config.directory.is_empty() {
        (None, None)
    } else {
        fs::create_dir_all(&config.directory)?;
        let appender = tracing_appender::rolling::daily(&config.directory, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer().with_writer(writer).with_ansi(false);
        (Some(layer), Some(guard))
    };

    tracing_subscriber::registry()
        .with(env_filter(&config.level))
        .with(fmt::layer())
        .with(file_layer)
        .init();

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("trace"), LevelFilter::TRACE);
        assert_eq!(parse_level("debug"), LevelFilter::DEBUG);
        assert_eq!(parse_level("WARN"), LevelFilter::WARN);
        assert_eq!(parse_level(" error "), LevelFilter::ERROR);
        assert_eq!(parse_level("nonsense"), LevelFilter::INFO);
    }
}
