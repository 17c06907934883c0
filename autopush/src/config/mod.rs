//! Configuration for learning and client-state sizing.
//!
//! All values have defaults; [`AutoPushConfig::validate`] must pass before a
//! learning cache is built. Invalid settings are rejected up front rather
//! than discovered while serving traffic.

mod file;

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::client_state::{max_capacity, DEFAULT_MAX_PATHS};

pub use file::{config_file_path, load_config_file, parse_config_str, CONFIG_FILE_NAME};

// ==================== Learning Defaults ====================

/// Default warm-up window in milliseconds.
///
/// Leaf requests arriving within this window after a primary request are
/// treated as belonging to it.
pub const DEFAULT_WARMUP_MS: u64 = 500;

/// Default success ratio at or above which an association is promoted.
pub const DEFAULT_PROMOTION_RATIO: f64 = 0.8;

/// Default success ratio at or below which a trial restarts.
pub const DEFAULT_DEMOTION_RATIO: f64 = 0.2;

/// Default number of trial windows before a decision is made.
pub const DEFAULT_MINIMUM_REQUESTS: u32 = 1;

/// Errors raised while building or loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Warm-up window must be positive.
    #[error("warmup duration must be greater than zero")]
    InvalidWarmup,

    /// A ratio fell outside `[0, 1]`.
    #[error("{name} must be within [0, 1], got {value}")]
    RatioOutOfRange { name: &'static str, value: f64 },

    /// Demotion threshold above promotion threshold.
    #[error("demotion ratio {demotion} exceeds promotion ratio {promotion}")]
    RatioOrder { promotion: f64, demotion: f64 },

    /// Minimum trial count below one.
    #[error("minimum requests must be at least 1")]
    InvalidMinimumRequests,

    /// Client-state filter sized for zero paths, or too many to fit a token.
    #[error("client state capacity must be within [1, {max}], got {value}")]
    InvalidCapacity { value: usize, max: usize },

    /// Config file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid INI.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A key held a value of the wrong type.
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Learning cache tuning.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetCacheConfig {
    /// Window after a primary request during which leaf requests are collected.
    #[serde(rename = "warmup_ms", serialize_with = "serialize_millis")]
    pub warmup_duration: Duration,

    /// Success ratio at or above which an association is trusted.
    pub promotion_ratio: f64,

    /// Success ratio at or below which the trial restarts from the latest window.
    pub demotion_ratio: f64,

    /// Trial windows required before promotion or demotion is considered.
    pub minimum_requests: u32,
}

impl Default for AssetCacheConfig {
    fn default() -> Self {
        Self {
            warmup_duration: Duration::from_millis(DEFAULT_WARMUP_MS),
            promotion_ratio: DEFAULT_PROMOTION_RATIO,
            demotion_ratio: DEFAULT_DEMOTION_RATIO,
            minimum_requests: DEFAULT_MINIMUM_REQUESTS,
        }
    }
}

impl AssetCacheConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the warm-up window.
    pub fn with_warmup(mut self, warmup: Duration) -> Self {
        self.warmup_duration = warmup;
        self
    }

    /// Set the promotion ratio.
    pub fn with_promotion_ratio(mut self, ratio: f64) -> Self {
        self.promotion_ratio = ratio;
        self
    }

    /// Set the demotion ratio.
    pub fn with_demotion_ratio(mut self, ratio: f64) -> Self {
        self.demotion_ratio = ratio;
        self
    }

    /// Set the minimum number of trial windows.
    pub fn with_minimum_requests(mut self, minimum: u32) -> Self {
        self.minimum_requests = minimum;
        self
    }

    /// Check all invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.warmup_duration.is_zero() {
            return Err(ConfigError::InvalidWarmup);
        }
        check_ratio("promotion_ratio", self.promotion_ratio)?;
        check_ratio("demotion_ratio", self.demotion_ratio)?;
        if self.demotion_ratio > self.promotion_ratio {
            return Err(ConfigError::RatioOrder {
                promotion: self.promotion_ratio,
                demotion: self.demotion_ratio,
            });
        }
        if self.minimum_requests < 1 {
            return Err(ConfigError::InvalidMinimumRequests);
        }
        Ok(())
    }
}

/// Client cache token sizing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientStateConfig {
    /// Paths a fresh filter is sized for at the fixed 1% error rate.
    pub capacity: usize,
}

impl ClientStateConfig {
    /// Check the capacity is positive and its token fits the size cap.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let max = max_capacity();
        if self.capacity == 0 || self.capacity > max {
            return Err(ConfigError::InvalidCapacity {
                value: self.capacity,
                max,
            });
        }
        Ok(())
    }
}

impl Default for ClientStateConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_MAX_PATHS,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AutoPushConfig {
    pub learning: AssetCacheConfig,
    pub client_state: ClientStateConfig,
}

impl AutoPushConfig {
    /// Check every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.learning.validate()?;
        self.client_state.validate()
    }
}

fn check_ratio(name: &'static str, value: f64) -> Result<(), ConfigError> {
    // NaN fails the range check too.
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::RatioOutOfRange { name, value })
    }
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AssetCacheConfig::default();
        assert_eq!(config.warmup_duration, Duration::from_millis(500));
        assert_eq!(config.promotion_ratio, DEFAULT_PROMOTION_RATIO);
        assert_eq!(config.demotion_ratio, DEFAULT_DEMOTION_RATIO);
        assert_eq!(config.minimum_requests, 1);
        assert!(AutoPushConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_warmup() {
        let config = AssetCacheConfig::new().with_warmup(Duration::ZERO);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidWarmup)));
    }

    #[test]
    fn test_rejects_inverted_ratios() {
        let config = AssetCacheConfig::new()
            .with_promotion_ratio(0.4)
            .with_demotion_ratio(0.6);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RatioOrder { .. })
        ));
    }

    #[test]
    fn test_equal_ratios_are_allowed() {
        let config = AssetCacheConfig::new()
            .with_promotion_ratio(0.5)
            .with_demotion_ratio(0.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_ratio_out_of_range() {
        let config = AssetCacheConfig::new().with_promotion_ratio(1.5);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RatioOutOfRange {
                name: "promotion_ratio",
                ..
            })
        ));

        let config = AssetCacheConfig::new().with_demotion_ratio(f64::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_minimum_requests() {
        let config = AssetCacheConfig::new().with_minimum_requests(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidMinimumRequests)
        ));
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let config = AutoPushConfig {
            client_state: ClientStateConfig { capacity: 0 },
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCapacity { value: 0, .. })
        ));
    }

    #[test]
    fn test_capacity_bounded_by_token_size() {
        let at_limit = ClientStateConfig {
            capacity: max_capacity(),
        };
        assert!(at_limit.validate().is_ok());

        let over = ClientStateConfig {
            capacity: max_capacity() + 1,
        };
        let err = over.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCapacity { .. }));
        assert!(err.to_string().contains(&max_capacity().to_string()));
    }

    #[test]
    fn test_serializes_warmup_as_millis() {
        let json = serde_json::to_value(AutoPushConfig::default()).unwrap();
        assert_eq!(json["learning"]["warmup_ms"], 500);
        assert_eq!(json["client_state"]["capacity"], 100);
    }

    #[test]
    fn test_error_display() {
        let err = ConfigError::RatioOrder {
            promotion: 0.4,
            demotion: 0.6,
        };
        assert!(err.to_string().contains("0.6"));
        assert!(err.to_string().contains("0.4"));
    }
}
