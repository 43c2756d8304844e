//! Creation-Time Index
//!
//! Second-granularity buckets of keys, ordered oldest first. Used by the
//! eviction sweep to propose candidates; never treated as authoritative.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use rocksdb::{IteratorMode, WriteOptions, DB};

use crate::error::Result;

use super::db::{column_family, CF_CREATE_TIME};

/// Secondary index: creation second → keys written in that second
///
/// ## Concurrency:
/// - Bucket updates are read-modify-write; `write_lock` serializes them so
///   concurrent appends to the same second are not lost
/// - Readers iterate without the lock (RocksDB iterators see a snapshot)
pub struct CreationTimeIndex {
    /// Shared database handle
    db: Arc<DB>,

    /// Write options for bucket updates
    write_opts: WriteOptions,

    /// Serializes bucket read-modify-write cycles
    write_lock: Mutex<()>,
}

impl CreationTimeIndex {
    pub fn new(db: Arc<DB>) -> Self {
        Self {
            db,
            write_opts: WriteOptions::default(),
            write_lock: Mutex::new(()),
        }
    }

    /// Append `key` to the bucket of the current second
    pub fn record(&self, key: &[u8]) -> Result<()> {
        self.record_many_at(now_secs(), std::iter::once(key))
    }

    /// Append several keys to the bucket of the current second
    pub fn record_many<'a, I>(&self, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        self.record_many_at(now_secs(), keys)
    }

    /// Append `key` to the bucket of an explicit timestamp
    pub fn record_at(&self, timestamp: u64, key: &[u8]) -> Result<()> {
        self.record_many_at(timestamp, std::iter::once(key))
    }

    fn record_many_at<'a, I>(&self, timestamp: u64, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let cf = column_family(&self.db, CF_CREATE_TIME)?;
        let bucket_key = timestamp.to_be_bytes();

        let _guard = self.write_lock.lock();

        let mut bucket = match self.db.get_cf(cf, bucket_key)? {
            Some(bytes) => decode_bucket(&bytes)?,
            None => Vec::new(),
        };
        bucket.extend(keys.into_iter().map(<[u8]>::to_vec));

        self.db
            .put_cf_opt(cf, bucket_key, encode_bucket(&bucket)?, &self.write_opts)?;
        Ok(())
    }

    /// Remove one occurrence of `key`, searching buckets oldest first
    ///
    /// Stops at the first bucket holding the key; stale duplicates in later
    /// buckets are left alone. Returns whether an occurrence was removed.
    pub fn remove(&self, key: &[u8]) -> Result<bool> {
        let cf = column_family(&self.db, CF_CREATE_TIME)?;

        let _guard = self.write_lock.lock();

        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (bucket_key, bytes) = item?;

            let mut bucket = match decode_bucket(&bytes) {
                Ok(bucket) => bucket,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping undecodable time bucket");
                    continue;
                }
            };

            let Some(pos) = bucket.iter().position(|k| k.as_slice() == key) else {
                continue;
            };
            bucket.remove(pos);

            if bucket.is_empty() {
                self.db.delete_cf_opt(cf, &bucket_key, &self.write_opts)?;
            } else {
                self.db
                    .put_cf_opt(cf, &bucket_key, encode_bucket(&bucket)?, &self.write_opts)?;
            }
            return Ok(true);
        }

        Ok(false)
    }

    /// Visit every (timestamp, key) pair, oldest bucket first
    ///
    /// The visitor returns `ControlFlow::Break` to stop early. Undecodable
    /// buckets are skipped.
    pub fn scan_oldest<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(u64, &[u8]) -> ControlFlow<()>,
    {
        let cf = column_family(&self.db, CF_CREATE_TIME)?;

        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (bucket_key, bytes) = item?;

            let Some(timestamp) = decode_timestamp(&bucket_key) else {
                tracing::warn!("skipping time bucket with malformed key");
                continue;
            };
            let bucket = match decode_bucket(&bytes) {
                Ok(bucket) => bucket,
                Err(e) => {
                    tracing::warn!(timestamp, error = %e, "skipping undecodable time bucket");
                    continue;
                }
            };

            for key in &bucket {
                if visit(timestamp, key).is_break() {
                    return Ok(());
                }
            }
        }

        Ok(())
    }

    /// All buckets in ascending order (for testing and debugging)
    pub fn buckets(&self) -> Result<Vec<(u64, Vec<Vec<u8>>)>> {
        let cf = column_family(&self.db, CF_CREATE_TIME)?;
        let mut out = Vec::new();

        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (bucket_key, bytes) = item?;
            if let Some(timestamp) = decode_timestamp(&bucket_key) {
                out.push((timestamp, decode_bucket(&bytes)?));
            }
        }

        Ok(out)
    }

    /// Total number of (possibly duplicate) key occurrences
    pub fn entry_count(&self) -> Result<usize> {
        Ok(self.buckets()?.iter().map(|(_, keys)| keys.len()).sum())
    }
}

// =============================================================================
// Bucket Codec
// =============================================================================

fn encode_bucket(keys: &[Vec<u8>]) -> Result<Vec<u8>> {
    Ok(bincode::serialize(keys)?)
}

fn decode_bucket(bytes: &[u8]) -> Result<Vec<Vec<u8>>> {
    Ok(bincode::deserialize(bytes)?)
}

fn decode_timestamp(bucket_key: &[u8]) -> Option<u64> {
    let raw: [u8; 8] = bucket_key.try_into().ok()?;
    Some(u64::from_be_bytes(raw))
}

/// Current unix time in seconds
pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
