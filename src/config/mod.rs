//! Configuration module for streamable-rs
//!
//! This module holds the engine-wide defaults that stages resolve when a
//! stream is iterated:
//! - Default emission order of concurrent stages
//! - Worker thread naming and flatten lane capacity
//! - Default progress reporting cadence for `observe`
//!
//! A stream carries the configuration it was declared with; use
//! [`Stream::with_config`](crate::Stream::with_config) to attach another one.
//!
//! # Config Location
//!
//! The default config file lives in the platform-appropriate location:
//! - **Linux**: `~/.config/streamable-rs/engine.json`
//! - **macOS**: `~/Library/Application Support/streamable-rs/engine.json`
//! - **Windows**: `%APPDATA%\streamable-rs\engine.json`
//!
//! # Example
//!
//! ```ignore
//! use streamable_rs::config::EngineConfig;
//!
//! let config = EngineConfig::load("engine.toml")?;
//! let stream = Stream::new(0..100).with_config(config)?;
//! ```

use crate::error::{Result, StreamError};
use crate::pipeline::report::Cadence;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for config directories
pub const APP_ID: &str = "streamable-rs";

/// Default config filename
pub const CONFIG_FILE: &str = "engine.json";

/// Default prefix for worker thread names
pub const DEFAULT_THREAD_NAME_PREFIX: &str = "streamable-worker";

/// Default number of elements buffered per concurrent flatten lane
pub const DEFAULT_FLATTEN_LANE_CAPACITY: usize = 64;

// ==================== Config Directory ====================

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID))
}

/// Get the path to the default config file
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join(CONFIG_FILE))
}

// ==================== Concurrency Settings ====================

/// Defaults for concurrent map and flatten stages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// Emit results in upstream order unless a stage asks otherwise
    #[serde(default = "default_ordered")]
    pub ordered: bool,

    /// Worker threads are named `<prefix>-<index>`
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,

    /// Elements buffered per in-flight inner sequence in `par_flatten`
    #[serde(default = "default_flatten_lane_capacity")]
    pub flatten_lane_capacity: usize,
}

fn default_ordered() -> bool {
    true
}

fn default_thread_name_prefix() -> String {
    DEFAULT_THREAD_NAME_PREFIX.to_string()
}

fn default_flatten_lane_capacity() -> usize {
    DEFAULT_FLATTEN_LANE_CAPACITY
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            ordered: default_ordered(),
            thread_name_prefix: default_thread_name_prefix(),
            flatten_lane_capacity: default_flatten_lane_capacity(),
        }
    }
}

// ==================== Observe Settings ====================

/// Defaults for `observe` stages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserveConfig {
    /// Reporting cadence used when a stage does not set its own
    #[serde(default)]
    pub cadence: Cadence,
}

// ==================== Engine Config ====================

/// Engine-wide configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,

    #[serde(default)]
    pub observe: ObserveConfig,
}

impl EngineConfig {
    /// Check values that serde cannot reject on its own
    pub fn validate(&self) -> Result<()> {
        if self.concurrency.flatten_lane_capacity == 0 {
            return Err(StreamError::Configuration(
                "flatten_lane_capacity must be at least 1".to_string(),
            ));
        }
        if self.concurrency.thread_name_prefix.is_empty() {
            return Err(StreamError::Configuration(
                "thread_name_prefix must not be empty".to_string(),
            ));
        }
        self.observe.cadence.validate()
    }

    /// Load a config file, TOML if the extension is `.toml`, JSON otherwise
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            StreamError::Configuration(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: Self = if is_toml(path) {
            toml::from_str(&content).map_err(|e| {
                StreamError::Serialization(format!("Failed to parse config file {:?}: {}", path, e))
            })?
        } else {
            serde_json::from_str(&content).map_err(|e| {
                StreamError::Serialization(format!("Failed to parse config file {:?}: {}", path, e))
            })?
        };

        config.validate()?;
        Ok(config)
    }

    /// Load the default config file, returning defaults on any error
    pub fn load_or_default() -> Self {
        let Some(path) = default_config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load engine config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save to a file, TOML if the extension is `.toml`, JSON otherwise
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_toml(path) {
            toml::to_string_pretty(self)
                .map_err(|e| StreamError::Serialization(format!("Failed to serialize config: {}", e)))?
        } else {
            serde_json::to_string_pretty(self)
                .map_err(|e| StreamError::Serialization(format!("Failed to serialize config: {}", e)))?
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(path, content).map_err(|e| {
            StreamError::Configuration(format!("Failed to write config file {:?}: {}", path, e))
        })
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.concurrency.ordered);
        assert_eq!(config.concurrency.thread_name_prefix, DEFAULT_THREAD_NAME_PREFIX);
        assert_eq!(config.concurrency.flatten_lane_capacity, 64);
        assert_eq!(config.observe.cadence, Cadence::Logarithmic);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "concurrency": { "ordered": false } }"#).unwrap();
        assert!(!config.concurrency.ordered);
        assert_eq!(config.concurrency.flatten_lane_capacity, 64);
        assert_eq!(config.observe, ObserveConfig::default());
    }

    #[test]
    fn test_json_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("engine.json");

        let mut config = EngineConfig::default();
        config.concurrency.thread_name_prefix = "io".to_string();
        config.observe.cadence = Cadence::Every(10);
        config.save(&path).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_toml_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(
            &path,
            "[concurrency]\nordered = false\nflatten_lane_capacity = 8\n\n[observe]\ncadence = { every = 5 }\n",
        )
        .unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert!(!config.concurrency.ordered);
        assert_eq!(config.concurrency.flatten_lane_capacity, 8);
        assert_eq!(config.observe.cadence, Cadence::Every(5));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{ "concurrency": { "flatten_lane_capacity": 0 } }"#).unwrap();
        assert!(matches!(
            EngineConfig::load(&path),
            Err(StreamError::Configuration(_))
        ));

        std::fs::write(&path, r#"{ "observe": { "cadence": { "every": 0 } } }"#).unwrap();
        assert!(EngineConfig::load(&path).is_err());
    }

    #[test]
    fn test_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            EngineConfig::load(&path),
            Err(StreamError::Serialization(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = EngineConfig::load("/definitely/not/here/engine.json");
        assert!(matches!(result, Err(StreamError::Configuration(_))));
    }
}
