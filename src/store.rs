//! Store Module
//!
//! The storage façade: one handle over the blob store, the two indexes and
//! the eviction manager.
//!
//! ## Responsibilities
//! - Open every component from a [`Config`]
//! - Reject empty keys and empty batches before any I/O
//! - Keep the live config and the eviction loop in step on updates
//! - Keep the `keys` gauge current: seeded from RocksDB's estimate on
//!   open, then adjusted by every write and delete
//! - Shut the eviction loop down on close/drop

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::blob::BlobStore;
use crate::config::Config;
use crate::error::{KvError, Result};
use crate::eviction::{EvictionManager, EvictionPolicy, EvictionReport, StatvfsProbe, Sweeper, UsageProbe};
use crate::index::{open_database, CreationTimeIndex, PrimaryIndex, Record};
use crate::metrics::Metrics;

/// The key-value store
///
/// All methods take `&self`; share it across threads with `Arc<Store>`.
pub struct Store {
    /// Currently applied configuration
    config: RwLock<Config>,

    /// Primary index (owns the placement policy)
    index: Arc<PrimaryIndex>,

    /// Background eviction
    eviction: EvictionManager,

    metrics: Arc<Metrics>,
}

impl Store {
    /// Open or create a store, probing disk usage with `statvfs`
    ///
    /// On startup:
    /// 1. Open the blob store directory
    /// 2. Open RocksDB with its column families
    /// 3. Persist the provided config under `global.config`
    /// 4. Start eviction if enabled
    pub fn open(config: Config, metrics: Arc<Metrics>) -> Result<Self> {
        Self::open_with_probe(config, metrics, Arc::new(StatvfsProbe))
    }

    /// Open with a custom disk usage probe
    pub fn open_with_probe(
        config: Config,
        metrics: Arc<Metrics>,
        probe: Arc<dyn UsageProbe>,
    ) -> Result<Self> {
        let blobs = Arc::new(BlobStore::open(&config.disk_path)?);
        let db = open_database(&config.rocksdb_path)?;

        let time_index = Arc::new(CreationTimeIndex::new(Arc::clone(&db)));
        let index = Arc::new(PrimaryIndex::new(
            db,
            blobs,
            time_index,
            config.disk_threshold,
        ));
        index.put_config(&config)?;

        if let Ok(count) = index.estimated_key_count() {
            metrics.keys.set(count as i64);
        }

        let sweeper = Arc::new(Sweeper::new(Arc::clone(&index), probe, Arc::clone(&metrics)));
        let eviction = EvictionManager::new(sweeper);

        if config.eviction.enabled {
            eviction.start(EvictionPolicy::from(&config.eviction))?;
        }

        tracing::info!(
            rocksdb_path = %config.rocksdb_path.display(),
            disk_path = %config.disk_path.display(),
            disk_threshold = config.disk_threshold,
            eviction = config.eviction.enabled,
            "store opened"
        );

        Ok(Self {
            config: RwLock::new(config),
            index,
            eviction,
            metrics,
        })
    }

    // =========================================================================
    // Point Operations
    // =========================================================================

    /// Store a value; large values overflow to the blob store
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        check_key(key)?;
        if self.index.set(key, value)? {
            self.metrics.keys.add(1);
        }
        Ok(())
    }

    /// Read a value
    ///
    /// `Ok(None)` means the key is unknown; an evicted key is
    /// `Err(KvError::Evicted)`.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        check_key(key)?;
        self.index.get(key)
    }

    /// Delete a key; returns whether it existed
    pub fn delete(&self, key: &[u8]) -> Result<bool> {
        check_key(key)?;
        let existed = self.index.delete(key)?;
        if existed {
            self.metrics.keys.sub(1);
        }
        Ok(existed)
    }

    // =========================================================================
    // Scans
    // =========================================================================

    /// Keys with the given prefix
    pub fn scan(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        self.index.scan(prefix)
    }

    /// Keys with the given prefix and their values
    pub fn scan_with_values(&self, prefix: &[u8]) -> Result<BTreeMap<Vec<u8>, Vec<u8>>> {
        self.index.scan_with_values(prefix, None)
    }

    /// Like `scan_with_values`, stopping after `limit` entries
    pub fn scan_with_values_limit(
        &self,
        prefix: &[u8],
        limit: usize,
    ) -> Result<BTreeMap<Vec<u8>, Vec<u8>>> {
        self.index.scan_with_values(prefix, Some(limit))
    }

    // =========================================================================
    // Batch Operations
    // =========================================================================

    /// Store several values; the index write is atomic
    pub fn mset<I, K, V>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let entries = entries
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_vec(), v.as_ref().to_vec()))
            .collect::<Vec<_>>();

        if entries.is_empty() {
            return Err(KvError::EmptyBatch);
        }
        for (key, _) in &entries {
            check_key(key)?;
        }

        let created = self.index.mset(&entries)?;
        self.metrics.keys.add(created as i64);
        Ok(())
    }

    /// Read several values; missing or unreadable keys are omitted
    pub fn mget<I, K>(&self, keys: I) -> Result<HashMap<Vec<u8>, Vec<u8>>>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        let keys = collect_keys(keys)?;
        Ok(self.index.mget(&keys))
    }

    /// Delete several keys; returns how many existed
    pub fn mdelete<I, K>(&self, keys: I) -> Result<usize>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        let keys = collect_keys(keys)?;
        let existed = self.index.mdelete(&keys)?;
        self.metrics.keys.sub(existed as i64);
        Ok(existed)
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// The persisted configuration (defaults if none was persisted)
    pub fn get_config(&self) -> Result<Config> {
        self.index.get_config()
    }

    /// Persist and apply a new configuration
    ///
    /// The placement threshold applies to subsequent writes. Eviction is
    /// restarted with the new policy, or stopped if disabled. Paths only
    /// take effect on the next open.
    pub fn update_config(&self, config: Config) -> Result<()> {
        self.index.put_config(&config)?;

        if config.eviction.enabled {
            self.eviction.restart(EvictionPolicy::from(&config.eviction))?;
        } else {
            self.eviction.stop()?;
        }

        tracing::info!(
            disk_threshold = config.disk_threshold,
            eviction = config.eviction.enabled,
            "config updated"
        );

        *self.config.write() = config;
        Ok(())
    }

    /// The configuration currently applied in memory
    pub fn config(&self) -> Config {
        self.config.read().clone()
    }

    // =========================================================================
    // Eviction
    // =========================================================================

    /// Start the eviction loop with the current policy
    pub fn start_eviction(&self) -> Result<()> {
        let policy = EvictionPolicy::from(&self.config.read().eviction);
        self.eviction.start(policy)
    }

    /// Stop the eviction loop, waiting for it to exit
    pub fn stop_eviction(&self) -> Result<()> {
        self.eviction.stop()
    }

    pub fn eviction_running(&self) -> bool {
        self.eviction.is_running()
    }

    /// Run one check-and-evict cycle on the calling thread
    pub fn run_eviction_cycle(&self) -> Result<EvictionReport> {
        let policy = EvictionPolicy::from(&self.config.read().eviction);
        self.eviction.run_cycle(&policy)
    }

    /// Evict up to `batch_size` disk-backed keys now, ignoring usage
    pub fn evict_now(&self, batch_size: usize) -> Result<EvictionReport> {
        self.eviction.evict_now(batch_size)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Stop eviction and flush RocksDB
    pub fn close(self) -> Result<()> {
        self.eviction.stop()?;
        self.index.flush()?;
        tracing::info!("store closed");
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Raw placement record of a key
    pub fn record(&self, key: &[u8]) -> Result<Option<Record>> {
        self.index.get_record(key)
    }

    pub fn blobs(&self) -> &BlobStore {
        self.index.blobs()
    }

    pub fn time_index(&self) -> &CreationTimeIndex {
        self.index.time_index()
    }

    pub fn estimated_key_count(&self) -> Result<u64> {
        self.index.estimated_key_count()
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }
}

fn check_key(key: &[u8]) -> Result<()> {
    if key.is_empty() {
        return Err(KvError::EmptyKey);
    }
    Ok(())
}

fn collect_keys<I, K>(keys: I) -> Result<Vec<Vec<u8>>>
where
    I: IntoIterator<Item = K>,
    K: AsRef<[u8]>,
{
    let keys = keys
        .into_iter()
        .map(|k| k.as_ref().to_vec())
        .collect::<Vec<_>>();

    if keys.is_empty() {
        return Err(KvError::EmptyBatch);
    }
    for key in &keys {
        check_key(key)?;
    }
    Ok(keys)
}
