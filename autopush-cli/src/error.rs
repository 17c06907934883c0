//! CLI error type.

use std::fmt;
use std::path::PathBuf;

use autopush::config::ConfigError;
use autopush::logging::LoggingError;
use autopush::AutoPushError;

/// Errors reported to the user before exiting with status 1.
#[derive(Debug)]
pub enum CliError {
    /// Configuration could not be loaded or is invalid.
    Config(String),
    /// An access log line could not be parsed.
    Log { line: usize, message: String },
    /// A client cache token could not be decoded.
    Token(String),
    /// Reading an input file failed.
    Io { path: PathBuf, source: std::io::Error },
    /// Logging or runtime setup failed.
    Setup(String),
    /// JSON output failed.
    Json(serde_json::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Log { line, message } => write!(f, "Access log line {}: {}", line, message),
            CliError::Token(msg) => write!(f, "Invalid token: {}", msg),
            CliError::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            CliError::Setup(msg) => write!(f, "Setup failed: {}", msg),
            CliError::Json(e) => write!(f, "JSON output failed: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Io { source, .. } => Some(source),
            CliError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<AutoPushError> for CliError {
    fn from(e: AutoPushError) -> Self {
        match e {
            AutoPushError::Config(e) => e.into(),
            other => CliError::Setup(other.to_string()),
        }
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Setup(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Json(e)
    }
}
