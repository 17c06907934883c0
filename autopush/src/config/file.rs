//! INI configuration file loading.
//!
//! ```ini
//! [learning]
//! warmup_ms = 500
//! promotion_ratio = 0.8
//! demotion_ratio = 0.2
//! minimum_requests = 1
//!
//! [client_state]
//! capacity = 100
//! ```
//!
//! Missing sections or keys keep their defaults. The result is validated
//! before it is returned.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};

use super::{AutoPushConfig, ConfigError};

/// Config file name inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Default config file location (`<config dir>/autopush/config.ini`).
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("autopush").join(CONFIG_FILE_NAME))
}

/// Load and validate a config file.
pub fn load_config_file(path: &Path) -> Result<AutoPushConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    parse_config_str(&contents)
}

/// Parse and validate INI text.
pub fn parse_config_str(contents: &str) -> Result<AutoPushConfig, ConfigError> {
    let ini = Ini::load_from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
    let mut config = AutoPushConfig::default();

    if let Some(section) = ini.section(Some("learning")) {
        if let Some(ms) = parse_key::<u64>(section, "learning", "warmup_ms")? {
            config.learning.warmup_duration = Duration::from_millis(ms);
        }
        if let Some(ratio) = parse_key(section, "learning", "promotion_ratio")? {
            config.learning.promotion_ratio = ratio;
        }
        if let Some(ratio) = parse_key(section, "learning", "demotion_ratio")? {
            config.learning.demotion_ratio = ratio;
        }
        if let Some(minimum) = parse_key(section, "learning", "minimum_requests")? {
            config.learning.minimum_requests = minimum;
        }
    }

    if let Some(section) = ini.section(Some("client_state")) {
        if let Some(capacity) = parse_key(section, "client_state", "capacity")? {
            config.client_state.capacity = capacity;
        }
    }

    config.validate()?;
    Ok(config)
}

fn parse_key<T: FromStr>(
    section: &Properties,
    section_name: &str,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match section.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: format!("{}.{}", section_name, key),
                value: raw.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse_config_str("").unwrap();
        assert_eq!(config, AutoPushConfig::default());
    }

    #[test]
    fn test_overrides_apply() {
        let config = parse_config_str(
            "[learning]\nwarmup_ms = 250\npromotion_ratio = 0.9\nminimum_requests = 3\n\
             [client_state]\ncapacity = 400\n",
        )
        .unwrap();
        assert_eq!(config.learning.warmup_duration, Duration::from_millis(250));
        assert_eq!(config.learning.promotion_ratio, 0.9);
        assert_eq!(config.learning.demotion_ratio, 0.2);
        assert_eq!(config.learning.minimum_requests, 3);
        assert_eq!(config.client_state.capacity, 400);
    }

    #[test]
    fn test_bad_value_names_the_key() {
        let err = parse_config_str("[learning]\nwarmup_ms = soon\n").unwrap_err();
        match err {
            ConfigError::InvalidValue { key, value } => {
                assert_eq!(key, "learning.warmup_ms");
                assert_eq!(value, "soon");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_loaded_config_is_validated() {
        let err = parse_config_str("[learning]\ndemotion_ratio = 0.9\n").unwrap_err();
        assert!(matches!(err, ConfigError::RatioOrder { .. }));
    }

    #[test]
    fn test_oversized_capacity_is_rejected() {
        let err = parse_config_str("[client_state]\ncapacity = 60000\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidCapacity { value: 60000, .. }
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[learning]\nwarmup_ms = 40").unwrap();
        let config = load_config_file(file.path()).unwrap();
        assert_eq!(config.learning.warmup_duration, Duration::from_millis(40));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config_file(&dir.path().join("absent.ini")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_default_path_ends_with_file_name() {
        if let Some(path) = config_file_path() {
            assert!(path.ends_with("autopush/config.ini"));
        }
    }
}
