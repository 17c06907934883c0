//! CLI subcommands.

pub mod config;
pub mod replay;
pub mod token;

use std::path::Path;

use autopush::config::{config_file_path, load_config_file, AutoPushConfig};
use tracing::debug;

use crate::error::CliError;

/// Load configuration from `explicit`, else the default file if it exists,
/// else defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<AutoPushConfig, CliError> {
    if let Some(path) = explicit {
        return load_from(path);
    }
    match config_file_path() {
        Some(path) if path.is_file() => {
            debug!(path = %path.display(), "Loading config file");
            load_from(&path)
        }
        _ => Ok(AutoPushConfig::default()),
    }
}

fn load_from(path: &Path) -> Result<AutoPushConfig, CliError> {
    load_config_file(path).map_err(|e| CliError::Config(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_config_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[learning]\nminimum_requests = 3\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.learning.minimum_requests, 3);
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("nope.ini"))).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }
}
