//! Shared test fixtures

use std::sync::Arc;

use tempfile::TempDir;
use tierkv::eviction::FixedUsage;
use tierkv::{Config, Metrics, Store};

/// A store in a temp directory with a controllable usage probe
pub struct TestStore {
    pub dir: TempDir,
    pub store: Store,
    pub usage: Arc<FixedUsage>,
    pub metrics: Arc<Metrics>,
}

/// Config rooted in `dir` with eviction disabled
pub fn test_config(dir: &TempDir, disk_threshold: usize) -> Config {
    Config::builder()
        .rocksdb_path(dir.path().join("db"))
        .disk_path(dir.path().join("blobs"))
        .disk_threshold(disk_threshold)
        .eviction_enabled(false)
        .disk_usage_threshold(0.8)
        .check_interval(1)
        .batch_size(100)
        .build()
}

pub fn open_store(disk_threshold: usize) -> TestStore {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, disk_threshold);
    open_store_with(dir, config)
}

pub fn open_store_with(dir: TempDir, config: Config) -> TestStore {
    let usage = Arc::new(FixedUsage::new(0.0));
    let metrics = Arc::new(Metrics::new());
    let store = Store::open_with_probe(config, Arc::clone(&metrics), usage.clone()).unwrap();

    TestStore {
        dir,
        store,
        usage,
        metrics,
    }
}

/// A value of `len` bytes with a recognizable pattern
pub fn value_of(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| seed.wrapping_add(i as u8)).collect()
}
