use anyhow::{bail, Result};
use std::collections::HashMap;
use std::env;
use std::path::Path;

/// Default backstop cadence: reconcile once a minute
pub const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct Config {
    // Optional JSON seed file with business hour (and agent) records,
    // loaded at startup through the engine so seeds are validated like any
    // other write
    pub hours_file: Option<String>,

    // Reconcile backstop cadence in seconds
    pub reconcile_interval_secs: u64,

    // Health check HTTP server port (optional, disabled if not set)
    // When set, exposes /health, /ready, and /metrics endpoints
    pub health_port: Option<u16>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env if present, ignore if missing
        Self::from_getter(|key| env::var(key).ok())
    }

    /// Parse config from a custom getter function (for testing)
    pub fn from_getter<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Config {
            hours_file: get("HOURS_FILE").filter(|s| !s.is_empty()),

            reconcile_interval_secs: get("RECONCILE_INTERVAL_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_RECONCILE_INTERVAL_SECS),

            health_port: get("HEALTH_PORT").and_then(|s| s.parse().ok()),
        })
    }

    /// Create config from a HashMap (convenience for testing)
    #[cfg(test)]
    pub fn from_map(map: &HashMap<&str, &str>) -> Result<Self> {
        Self::from_getter(|key| map.get(key).map(|v| v.to_string()))
    }

    /// Validate configuration values at startup.
    /// Returns Ok(()) if all validations pass, or Err with details of what failed.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        // Validate seed file exists when configured
        if let Some(path) = &self.hours_file {
            if !Path::new(path).exists() {
                errors.push(format!("HOURS_FILE '{}' does not exist.", path));
            }
        }

        // Validate reconcile cadence is reasonable
        if self.reconcile_interval_secs == 0 {
            errors.push("RECONCILE_INTERVAL_SECS must be greater than 0.".to_string());
        } else if self.reconcile_interval_secs > 3600 {
            errors.push(format!(
                "RECONCILE_INTERVAL_SECS={} defeats the backstop (max recommended: 3600).",
                self.reconcile_interval_secs
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_env_uses_defaults() {
        let env = HashMap::new();
        let config = Config::from_map(&env).expect("should parse empty config");

        assert_eq!(config.hours_file, None);
        assert_eq!(
            config.reconcile_interval_secs,
            DEFAULT_RECONCILE_INTERVAL_SECS
        );
        assert_eq!(config.health_port, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_custom_interval() {
        let mut env = HashMap::new();
        env.insert("RECONCILE_INTERVAL_SECS", "300");
        let config = Config::from_map(&env).expect("should parse");
        assert_eq!(config.reconcile_interval_secs, 300);
    }

    #[test]
    fn test_invalid_interval_uses_default() {
        let mut env = HashMap::new();
        env.insert("RECONCILE_INTERVAL_SECS", "not_a_number");
        let config = Config::from_map(&env).expect("should parse with default");
        assert_eq!(
            config.reconcile_interval_secs,
            DEFAULT_RECONCILE_INTERVAL_SECS
        );
    }

    #[test]
    fn test_empty_hours_file_treated_as_unset() {
        let mut env = HashMap::new();
        env.insert("HOURS_FILE", "");
        let config = Config::from_map(&env).expect("should parse");
        assert_eq!(config.hours_file, None);
    }

    #[test]
    fn test_health_port_parsed() {
        let mut env = HashMap::new();
        env.insert("HEALTH_PORT", "9090");
        let config = Config::from_map(&env).expect("should parse");
        assert_eq!(config.health_port, Some(9090));
    }

    #[test]
    fn test_health_port_out_of_range_disabled() {
        let mut env = HashMap::new();
        env.insert("HEALTH_PORT", "99999");
        let config = Config::from_map(&env).expect("should parse");
        assert_eq!(config.health_port, None);
    }

    #[test]
    fn test_validation_missing_hours_file() {
        let mut env = HashMap::new();
        env.insert("HOURS_FILE", "/no/such/file/hours.json");
        let config = Config::from_map(&env).expect("should parse");
        let result = config.validate();
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("HOURS_FILE"), "error should mention HOURS_FILE: {}", err);
    }

    #[test]
    fn test_validation_zero_interval() {
        let mut env = HashMap::new();
        env.insert("RECONCILE_INTERVAL_SECS", "0");
        let config = Config::from_map(&env).expect("should parse");
        let result = config.validate();
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(
            err.contains("RECONCILE_INTERVAL_SECS"),
            "error should mention interval: {}",
            err
        );
    }

    #[test]
    fn test_validation_excessive_interval() {
        let mut env = HashMap::new();
        env.insert("RECONCILE_INTERVAL_SECS", "86400");
        let config = Config::from_map(&env).expect("should parse");
        let result = config.validate();
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("backstop"), "error should mention backstop: {}", err);
    }

    #[test]
    fn test_validation_collects_all_failures() {
        let mut env = HashMap::new();
        env.insert("HOURS_FILE", "/no/such/file/hours.json");
        env.insert("RECONCILE_INTERVAL_SECS", "0");
        let config = Config::from_map(&env).expect("should parse");
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("HOURS_FILE"));
        assert!(err.contains("RECONCILE_INTERVAL_SECS"));
    }
}
