//! Configuration for tierkv
//!
//! Centralized configuration with sensible defaults. The store persists
//! the active configuration as JSON under [`CONFIG_KEY`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Key under which the configuration record is persisted
pub const CONFIG_KEY: &str = "global.config";

/// Main configuration for a tierkv instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory of the RocksDB database
    pub rocksdb_path: PathBuf,

    /// Values strictly larger than this (in bytes) go to the blob store
    pub disk_threshold: usize,

    /// Root directory of the blob store
    ///
    /// Disk usage for eviction is measured on the filesystem holding it.
    pub disk_path: PathBuf,

    // -------------------------------------------------------------------------
    // Eviction Configuration
    // -------------------------------------------------------------------------
    pub eviction: EvictionConfig,
}

/// Eviction policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvictionConfig {
    /// Run the background eviction loop
    pub enabled: bool,

    /// Usage fraction (0.0 - 1.0) above which a sweep evicts
    pub disk_usage_threshold: f64,

    /// Seconds between checks
    pub check_interval: u64,

    /// Max keys evicted per sweep
    pub batch_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rocksdb_path: PathBuf::from("./data"),
            disk_threshold: 1024 * 1024, // 1 MB
            disk_path: PathBuf::from("./value_data"),
            eviction: EvictionConfig::default(),
        }
    }
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            disk_usage_threshold: 0.8,
            check_interval: 60,
            batch_size: 100,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Config rooted at one data directory
    ///
    /// ```text
    ///   {dir}/
    ///     ├── db/       (RocksDB)
    ///     └── blobs/    (blob files)
    /// ```
    pub fn with_data_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            rocksdb_path: dir.join("db"),
            disk_path: dir.join("blobs"),
            ..Self::default()
        }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse from JSON; missing fields take their defaults
    pub fn from_json(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the RocksDB directory
    pub fn rocksdb_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.rocksdb_path = path.into();
        self
    }

    /// Set the inline/disk placement threshold (in bytes)
    pub fn disk_threshold(mut self, bytes: usize) -> Self {
        self.config.disk_threshold = bytes;
        self
    }

    /// Set the blob store root
    pub fn disk_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.disk_path = path.into();
        self
    }

    /// Enable or disable background eviction
    pub fn eviction_enabled(mut self, enabled: bool) -> Self {
        self.config.eviction.enabled = enabled;
        self
    }

    /// Set the usage fraction that triggers eviction
    pub fn disk_usage_threshold(mut self, fraction: f64) -> Self {
        self.config.eviction.disk_usage_threshold = fraction;
        self
    }

    /// Set the check interval (in seconds)
    pub fn check_interval(mut self, secs: u64) -> Self {
        self.config.eviction.check_interval = secs;
        self
    }

    /// Set the max number of keys evicted per sweep
    pub fn batch_size(mut self, count: usize) -> Self {
        self.config.eviction.batch_size = count;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
