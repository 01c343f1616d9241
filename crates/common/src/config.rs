//! Common configuration types shared by the call client crates.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default log filter when neither `RUST_LOG` nor `CALL_LOG_LEVEL` is set.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Observability configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    pub log_level: String,
    /// Enable JSON-formatted logs
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            json_logs: false,
        }
    }
}

impl ObservabilityConfig {
    /// Read `CALL_LOG_LEVEL` and `CALL_JSON_LOGS` from a variable map.
    ///
    /// Unparseable booleans fall back to the default rather than failing:
    /// logging configuration never blocks startup.
    #[must_use]
    pub fn from_vars(vars: &HashMap<String, String>) -> Self {
        let log_level = vars
            .get("CALL_LOG_LEVEL")
            .filter(|level| !level.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        let json_logs = vars
            .get("CALL_JSON_LOGS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(false);

        Self {
            log_level,
            json_logs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observability_defaults() {
        let config = ObservabilityConfig::from_vars(&HashMap::new());
        assert_eq!(config, ObservabilityConfig::default());
        assert_eq!(config.log_level, "info");
        assert!(!config.json_logs);
    }

    #[test]
    fn test_observability_overrides() {
        let vars = HashMap::from([
            ("CALL_LOG_LEVEL".to_string(), "call_client=debug".to_string()),
            ("CALL_JSON_LOGS".to_string(), "true".to_string()),
        ]);
        let config = ObservabilityConfig::from_vars(&vars);
        assert_eq!(config.log_level, "call_client=debug");
        assert!(config.json_logs);
    }

    #[test]
    fn test_observability_bad_bool_falls_back() {
        let vars = HashMap::from([("CALL_JSON_LOGS".to_string(), "yes please".to_string())]);
        assert!(!ObservabilityConfig::from_vars(&vars).json_logs);
    }
}
