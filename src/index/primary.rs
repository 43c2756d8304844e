//! Primary Index
//!
//! Durable key → [`Record`] mapping with hybrid value placement: small
//! values live inline, large values go to the blob store and the index
//! keeps a reference.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rocksdb::{Direction, IteratorMode, WriteBatch, WriteOptions, DB};

use crate::blob::BlobStore;
use crate::config::{Config, CONFIG_KEY};
use crate::error::{KvError, Result};

use super::db::{column_family, CF_DEFAULT, CF_METADATA};
use super::record::Record;
use super::time::CreationTimeIndex;

/// The primary key index and its placement policy
///
/// ## Write path
/// 1. Large value → blob store (must succeed before the record exists)
/// 2. Record → RocksDB (`default` CF)
/// 3. Key → creation-time index (best-effort, failures only logged)
///
/// Blobs are released only by delete and eviction, never by overwrite.
///
/// ## Concurrency:
/// - `db` is shared with the time index and the eviction loop
/// - No lock is held here; per-write atomicity comes from RocksDB
pub struct PrimaryIndex {
    /// Shared database handle
    db: Arc<DB>,

    /// Where oversized values live
    blobs: Arc<BlobStore>,

    /// Eviction ordering hints
    time_index: Arc<CreationTimeIndex>,

    /// Values longer than this many bytes are stored as blobs
    disk_threshold: AtomicUsize,

    /// Write options for record updates
    write_opts: WriteOptions,
}

impl PrimaryIndex {
    pub fn new(
        db: Arc<DB>,
        blobs: Arc<BlobStore>,
        time_index: Arc<CreationTimeIndex>,
        disk_threshold: usize,
    ) -> Self {
        Self {
            db,
            blobs,
            time_index,
            disk_threshold: AtomicUsize::new(disk_threshold),
            write_opts: WriteOptions::default(),
        }
    }

    // =========================================================================
    // Point Operations
    // =========================================================================

    /// Store a value, choosing inline or blob placement by size
    ///
    /// Returns whether the key was absent before. A replaced record's blob
    /// is left on disk, since another key may share it.
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<bool> {
        let created = !self.contains(key)?;
        let record = self.place(value)?;

        self.put_record(key, &record)?;

        if let Err(e) = self.time_index.record(key) {
            tracing::warn!(key = %display_key(key), error = %e, "failed to record creation time");
        }

        tracing::debug!(
            key = %display_key(key),
            bytes = value.len(),
            on_disk = record.blob_id().is_some(),
            "set"
        );
        Ok(created)
    }

    /// Read a value
    ///
    /// Returns:
    /// - `Ok(Some(value))`: inline or blob-backed value
    /// - `Ok(None)`: key never written or deleted
    /// - `Err(Evicted)`: key known, value reclaimed by eviction
    /// - `Err(Corruption)`: record points at a missing blob
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.get_record(key)? {
            None => Ok(None),
            Some(record) => self.resolve(key, record).map(Some),
        }
    }

    /// Delete a key and its blob, if any
    ///
    /// Returns whether the key existed. Deleting a missing key succeeds.
    pub fn delete(&self, key: &[u8]) -> Result<bool> {
        let record = match self.get_record(key) {
            Ok(Some(record)) => Some(record),
            Ok(None) => return Ok(false),
            // An undecodable record is still removed; its blob, if any, leaks
            Err(KvError::Corruption(reason)) => {
                tracing::warn!(key = %display_key(key), %reason, "deleting undecodable record");
                None
            }
            Err(e) => return Err(e),
        };

        if let Some(id) = record.as_ref().and_then(Record::blob_id) {
            self.blobs.delete(id)?;
        }

        let cf = column_family(&self.db, CF_DEFAULT)?;
        self.db.delete_cf_opt(cf, key, &self.write_opts)?;

        if let Err(e) = self.time_index.remove(key) {
            tracing::warn!(key = %display_key(key), error = %e, "failed to remove creation time");
        }

        tracing::debug!(key = %display_key(key), "delete");
        Ok(true)
    }

    // =========================================================================
    // Scans
    // =========================================================================

    /// Keys starting with `prefix`, in lexicographic order
    pub fn scan(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        let mut keys = Vec::new();
        self.scan_records(prefix, |key, _| {
            keys.push(key.to_vec());
            true
        })?;
        Ok(keys)
    }

    /// Keys starting with `prefix` with their resolved values
    ///
    /// Entries that fail to resolve (evicted, dangling) are skipped.
    /// Stops after `limit` values when a limit is given.
    pub fn scan_with_values(
        &self,
        prefix: &[u8],
        limit: Option<usize>,
    ) -> Result<BTreeMap<Vec<u8>, Vec<u8>>> {
        let mut out = BTreeMap::new();
        if limit == Some(0) {
            return Ok(out);
        }

        self.scan_records(prefix, |key, record| {
            match self.resolve(key, record) {
                Ok(value) => {
                    out.insert(key.to_vec(), value);
                }
                Err(e) => {
                    tracing::debug!(key = %display_key(key), error = %e, "scan skipped entry");
                }
            }
            limit.map_or(true, |limit| out.len() < limit)
        })?;

        Ok(out)
    }

    /// Walk `(key, record)` pairs under `prefix` until `visit` returns false
    fn scan_records<F>(&self, prefix: &[u8], mut visit: F) -> Result<()>
    where
        F: FnMut(&[u8], Record) -> bool,
    {
        let cf = column_family(&self.db, CF_DEFAULT)?;
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));

        for item in iter {
            let (key, bytes) = item?;

            if !key.starts_with(prefix) {
                break;
            }
            if &*key == CONFIG_KEY.as_bytes() {
                continue;
            }

            let record = match Record::decode(&bytes) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(key = %display_key(&key), error = %e, "undecodable record");
                    continue;
                }
            };

            if !visit(&key[..], record) {
                break;
            }
        }

        Ok(())
    }

    // =========================================================================
    // Batch Operations
    // =========================================================================

    /// Store several values with one atomic index write
    ///
    /// A key repeated in `entries` is written once, with its last value.
    /// Blob writes happen first and are not rolled back if the index write
    /// fails. Returns how many keys were absent before.
    pub fn mset(&self, entries: &[(Vec<u8>, Vec<u8>)]) -> Result<usize> {
        let cf = column_family(&self.db, CF_DEFAULT)?;

        let mut latest: HashMap<&[u8], usize> = HashMap::with_capacity(entries.len());
        for (pos, (key, _)) in entries.iter().enumerate() {
            latest.insert(key.as_slice(), pos);
        }

        let mut batch = WriteBatch::default();
        let mut written = Vec::with_capacity(latest.len());
        let mut created = 0;

        for (pos, (key, value)) in entries.iter().enumerate() {
            if latest.get(key.as_slice()) != Some(&pos) {
                continue;
            }
            if !self.contains(key)? {
                created += 1;
            }

            let record = self.place(value)?;
            batch.put_cf(cf, key, record.encode());
            written.push(key.as_slice());
        }

        self.db.write_opt(batch, &self.write_opts)?;

        if let Err(e) = self.time_index.record_many(written.iter().copied()) {
            tracing::warn!(count = written.len(), error = %e, "failed to record creation times");
        }

        tracing::debug!(count = written.len(), created, "mset");
        Ok(created)
    }

    /// Read several values; keys that are missing or fail are omitted
    pub fn mget(&self, keys: &[Vec<u8>]) -> HashMap<Vec<u8>, Vec<u8>> {
        let mut out = HashMap::with_capacity(keys.len());

        for key in keys {
            match self.get(key) {
                Ok(Some(value)) => {
                    out.insert(key.clone(), value);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(key = %display_key(key), error = %e, "mget skipped key");
                }
            }
        }

        out
    }

    /// Delete several keys with one index write
    ///
    /// Blob and time-index cleanup is best-effort. Returns how many of the
    /// distinct keys existed.
    pub fn mdelete(&self, keys: &[Vec<u8>]) -> Result<usize> {
        let cf = column_family(&self.db, CF_DEFAULT)?;

        let mut batch = WriteBatch::default();
        let mut seen = HashSet::with_capacity(keys.len());
        let mut existed = 0;

        for key in keys {
            if !seen.insert(key.as_slice()) {
                continue;
            }

            match self.get_record(key) {
                Ok(Some(record)) => {
                    existed += 1;
                    if let Some(id) = record.blob_id() {
                        if let Err(e) = self.blobs.delete(id) {
                            tracing::warn!(blob_id = %id, error = %e, "failed to delete blob");
                        }
                    }
                }
                Ok(None) => {}
                Err(KvError::Corruption(reason)) => {
                    existed += 1;
                    tracing::warn!(key = %display_key(key), %reason, "deleting undecodable record");
                }
                Err(e) => {
                    tracing::warn!(key = %display_key(key), error = %e, "mdelete lookup failed");
                }
            }
            batch.delete_cf(cf, key);
        }

        self.db.write_opt(batch, &self.write_opts)?;

        for key in seen {
            if let Err(e) = self.time_index.remove(key) {
                tracing::warn!(key = %display_key(key), error = %e, "failed to remove creation time");
            }
        }

        tracing::debug!(count = keys.len(), existed, "mdelete");
        Ok(existed)
    }

    // =========================================================================
    // Records
    // =========================================================================

    /// Whether any record exists under `key`, without decoding it
    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        let cf = column_family(&self.db, CF_DEFAULT)?;
        Ok(self.db.get_pinned_cf(cf, key)?.is_some())
    }

    /// Raw record lookup, without blob resolution
    pub fn get_record(&self, key: &[u8]) -> Result<Option<Record>> {
        let cf = column_family(&self.db, CF_DEFAULT)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Record::decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Raw record write
    pub fn put_record(&self, key: &[u8], record: &Record) -> Result<()> {
        let cf = column_family(&self.db, CF_DEFAULT)?;
        self.db.put_cf_opt(cf, key, record.encode(), &self.write_opts)?;
        Ok(())
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Stored configuration, or defaults if none was stored yet
    pub fn get_config(&self) -> Result<Config> {
        let cf = column_family(&self.db, CF_METADATA)?;
        match self.db.get_cf(cf, CONFIG_KEY)? {
            Some(bytes) => Config::from_json(&bytes),
            None => Ok(Config::default()),
        }
    }

    /// Persist the configuration and apply its placement threshold
    pub fn put_config(&self, config: &Config) -> Result<()> {
        let cf = column_family(&self.db, CF_METADATA)?;
        self.db
            .put_cf_opt(cf, CONFIG_KEY, config.to_json()?, &self.write_opts)?;
        self.set_disk_threshold(config.disk_threshold);
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn disk_threshold(&self) -> usize {
        self.disk_threshold.load(Ordering::Relaxed)
    }

    pub fn set_disk_threshold(&self, bytes: usize) {
        self.disk_threshold.store(bytes, Ordering::Relaxed);
    }

    /// RocksDB's estimate of the number of primary records
    pub fn estimated_key_count(&self) -> Result<u64> {
        let cf = column_family(&self.db, CF_DEFAULT)?;
        Ok(self
            .db
            .property_int_value_cf(cf, "rocksdb.estimate-num-keys")?
            .unwrap_or(0))
    }

    /// Flush memtables of every column family
    pub fn flush(&self) -> Result<()> {
        for name in [CF_DEFAULT, super::db::CF_CREATE_TIME, CF_METADATA] {
            let cf = column_family(&self.db, name)?;
            self.db.flush_cf(cf)?;
        }
        Ok(())
    }

    pub fn blobs(&self) -> &Arc<BlobStore> {
        &self.blobs
    }

    pub fn time_index(&self) -> &Arc<CreationTimeIndex> {
        &self.time_index
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Decide placement, writing the blob if the value is large
    fn place(&self, value: &[u8]) -> Result<Record> {
        if value.len() > self.disk_threshold() {
            Ok(Record::DiskRef(self.blobs.store(value)?))
        } else {
            Ok(Record::Inline(value.to_vec()))
        }
    }

    /// Turn a record into the caller-visible value
    fn resolve(&self, key: &[u8], record: Record) -> Result<Vec<u8>> {
        match record {
            Record::Inline(value) => Ok(value),
            Record::Evicted => Err(KvError::evicted(key)),
            Record::DiskRef(id) => match self.blobs.load(&id) {
                Ok(value) => Ok(value),
                Err(KvError::BlobNotFound(_)) => Err(KvError::Corruption(format!(
                    "key {} references missing blob {}",
                    display_key(key),
                    id
                ))),
                Err(e) => Err(e),
            },
        }
    }
}

/// Lossy rendering of a key for logs and error messages
pub(crate) fn display_key(key: &[u8]) -> String {
    String::from_utf8_lossy(key).into_owned()
}
