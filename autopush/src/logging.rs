//! Tracing subscriber setup.
//!
//! Reads the `AUTOPUSH_LOG` environment variable for per-module levels, for
//! example `AUTOPUSH_LOG=autopush::learning=debug,autopush=info`. Falls back
//! to [`DEFAULT_FILTER`] when unset or invalid.
//!
//! Output goes to stderr, and optionally to a daily-rotated file through a
//! non-blocking writer. Keep the returned [`WorkerGuard`] alive for as long
//! as file output should be flushed.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding the filter directives.
pub const LOG_ENV_VAR: &str = "AUTOPUSH_LOG";

/// Filter used when [`LOG_ENV_VAR`] is unset.
pub const DEFAULT_FILTER: &str = "autopush=info";

/// Prefix of rotated log files.
pub const LOG_FILE_PREFIX: &str = "autopush.log";

/// Errors installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// Log directory could not be created.
    #[error("Failed to create log directory {path}: {source}")]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A global subscriber is already installed.
    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Logging options.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Directory for rotated log files; stderr only when `None`.
    pub log_dir: Option<PathBuf>,
    /// Overrides the environment and default filter.
    pub filter: Option<String>,
}

impl LogOptions {
    /// Also write logs to files in `dir`.
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Use these filter directives.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    fn env_filter(&self) -> EnvFilter {
        match &self.filter {
            Some(directives) => {
                EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
            }
            None => EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        }
    }
}

/// Install the global subscriber.
///
/// Returns the file writer's guard when a log directory was given.
pub fn init(options: &LogOptions) -> Result<Option<WorkerGuard>, LoggingError> {
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(true);

    let (file_layer, guard) = match &options.log_dir {
        Some(dir) => {
            let (writer, guard) = file_writer(dir)?;
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_thread_ids(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(options.env_filter())
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    Ok(guard)
}

fn file_writer(
    dir: &Path,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard), LoggingError> {
    std::fs::create_dir_all(dir).map_err(|source| LoggingError::Directory {
        path: dir.to_path_buf(),
        source,
    })?;
    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    Ok(tracing_appender::non_blocking(appender))
}
