//! Configuration management for the coordinator
//!
//! Provides configuration file support with TOML format, environment
//! variable overrides, and sensible defaults.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Coordinator tuning
    #[serde(default)]
    pub coordinator: CoordinatorConfig,

    /// Monitoring and observability
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// Coordinator tuning knobs
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CoordinatorConfig {
    /// Maximum number of shard queries running at once for a single call
    ///
    /// Clamped to 1 at runtime when any participating shard streams raw
    /// (unaggregated) points, so that response buffers stay bounded.
    #[serde(default = "default_concurrent_shard_query_limit")]
    pub concurrent_shard_query_limit: usize,

    /// Point batch size hint handed to shards when sizing their response
    /// buffers
    #[serde(default = "default_point_batch_size")]
    pub point_batch_size: usize,
}

/// Monitoring configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitoringConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable structured logging
    #[serde(default = "default_true")]
    pub structured_logging: bool,
}

// Default value functions
fn default_concurrent_shard_query_limit() -> usize {
    10
}
fn default_point_batch_size() -> usize {
    100
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            concurrent_shard_query_limit: default_concurrent_shard_query_limit(),
            point_batch_size: default_point_batch_size(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            structured_logging: true,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path, e))?;

        toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file {}: {}", path, e))
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: &str) -> Result<Self, String> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from environment variables only
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(limit) = std::env::var("TSDB_CONCURRENT_SHARD_QUERY_LIMIT") {
            if let Ok(n) = limit.parse() {
                self.coordinator.concurrent_shard_query_limit = n;
            }
        }
        if let Ok(batch) = std::env::var("TSDB_POINT_BATCH_SIZE") {
            if let Ok(n) = batch.parse() {
                self.coordinator.point_batch_size = n;
            }
        }
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            self.monitoring.log_level = log_level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.coordinator.concurrent_shard_query_limit == 0 {
            return Err("Concurrent shard query limit must be > 0".to_string());
        }
        if self.coordinator.point_batch_size == 0 {
            return Err("Point batch size must be > 0".to_string());
        }
        Ok(())
    }
}
