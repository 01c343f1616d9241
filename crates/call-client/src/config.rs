//! Call client configuration.
//!
//! Loaded from environment variables; everything has a default.

use crate::media::{MediaQualityProfile, DEFAULT_PROFILE};
use common::config::ObservabilityConfig;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Default origin and base path for invite links.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5173/";

/// Default time the demo waits for both sides to connect.
pub const DEFAULT_DEMO_TIMEOUT_SECONDS: u64 = 10;

/// Call client configuration.
#[derive(Clone)]
pub struct Config {
    /// Origin plus base path that invite links are built on.
    pub base_url: Url,

    /// Profile for the first local stream (default: HD).
    pub default_profile: MediaQualityProfile,

    /// How long the demo binary waits for `connected` (default: 10s).
    pub demo_timeout: Duration,

    pub observability: ObservabilityConfig,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url.as_str())
            .field("default_profile", &self.default_profile.label)
            .field("demo_timeout", &self.demo_timeout)
            .field("observability", &self.observability)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let base_url = vars
            .get("CALL_BASE_URL")
            .map_or(DEFAULT_BASE_URL, String::as_str);
        let base_url = Url::parse(base_url).map_err(|e| {
            ConfigError::InvalidValue(format!("CALL_BASE_URL must be a URL, got {base_url:?}: {e}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidValue(format!(
                "CALL_BASE_URL must be an http(s) origin, got {:?}",
                base_url.as_str()
            )));
        }

        let default_profile = match vars.get("CALL_DEFAULT_QUALITY") {
            Some(label) => MediaQualityProfile::by_label(label).ok_or_else(|| {
                ConfigError::InvalidValue(format!(
                    "CALL_DEFAULT_QUALITY must be one of HD, SD, Low, got {label:?}"
                ))
            })?,
            None => DEFAULT_PROFILE,
        };

        let demo_timeout_seconds = match vars.get("CALL_DEMO_TIMEOUT_SECONDS") {
            Some(value) => value
                .parse::<u64>()
                .ok()
                .filter(|seconds| *seconds > 0)
                .ok_or_else(|| {
                    ConfigError::InvalidValue(format!(
                        "CALL_DEMO_TIMEOUT_SECONDS must be a positive integer, got {value:?}"
                    ))
                })?,
            None => DEFAULT_DEMO_TIMEOUT_SECONDS,
        };

        Ok(Config {
            base_url,
            default_profile,
            demo_timeout: Duration::from_secs(demo_timeout_seconds),
            observability: ObservabilityConfig::from_vars(vars),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::media::{LOW, SD};

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(&HashMap::new()).unwrap();

        assert_eq!(config.base_url.as_str(), DEFAULT_BASE_URL);
        assert_eq!(config.default_profile, DEFAULT_PROFILE);
        assert_eq!(config.demo_timeout, Duration::from_secs(10));
        assert_eq!(config.observability, ObservabilityConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_vars(&vars(&[
            ("CALL_BASE_URL", "https://meet.example.com/app/"),
            ("CALL_DEFAULT_QUALITY", "sd"),
            ("CALL_DEMO_TIMEOUT_SECONDS", "3"),
            ("CALL_LOG_LEVEL", "debug"),
        ]))
        .unwrap();

        assert_eq!(config.base_url.as_str(), "https://meet.example.com/app/");
        assert_eq!(config.default_profile, SD);
        assert_eq!(config.demo_timeout, Duration::from_secs(3));
        assert_eq!(config.observability.log_level, "debug");
    }

    #[test]
    fn test_quality_label_is_case_insensitive() {
        let config = Config::from_vars(&vars(&[("CALL_DEFAULT_QUALITY", "LOW")])).unwrap();
        assert_eq!(config.default_profile, LOW);
    }

    #[test]
    fn test_invalid_base_url() {
        let result = Config::from_vars(&vars(&[("CALL_BASE_URL", "not a url")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));

        let result = Config::from_vars(&vars(&[("CALL_BASE_URL", "mailto:someone@example.com")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_invalid_quality() {
        let result = Config::from_vars(&vars(&[("CALL_DEFAULT_QUALITY", "4K")]));
        match result {
            Err(ConfigError::InvalidValue(msg)) => assert!(msg.contains("CALL_DEFAULT_QUALITY")),
            other => panic!("expected invalid value, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_timeout() {
        for value in ["0", "-1", "soon"] {
            let result = Config::from_vars(&vars(&[("CALL_DEMO_TIMEOUT_SECONDS", value)]));
            assert!(matches!(result, Err(ConfigError::InvalidValue(_))), "{value}");
        }
    }

    #[test]
    fn test_debug_output() {
        let config = Config::from_vars(&HashMap::new()).unwrap();
        let debug = format!("{config:?}");
        assert!(debug.contains("localhost:5173"));
        assert!(debug.contains("HD"));
    }
}
