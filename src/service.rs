//! Service Module
//!
//! The seam a request layer (HTTP, RPC) calls into: string keys, scan
//! limits, and per-operation metrics around the [`Store`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::error::{ErrorKind, KvError, Result};
use crate::metrics::{Metrics, OpMetrics};
use crate::store::Store;

/// Limit applied when a scan asks for none or for too many entries
pub const DEFAULT_SCAN_LIMIT: usize = 100;

/// Largest scan limit honored as requested
pub const MAX_SCAN_LIMIT: usize = 1000;

/// Result of a health check
#[derive(Debug, Clone, PartialEq)]
pub struct Health {
    pub eviction_running: bool,
    pub estimated_keys: u64,
    pub disk_usage: f64,
}

/// Key-value service over a shared store
#[derive(Clone)]
pub struct KvService {
    store: Arc<Store>,
    metrics: Arc<Metrics>,
}

impl KvService {
    pub fn new(store: Arc<Store>, metrics: Arc<Metrics>) -> Self {
        Self { store, metrics }
    }

    /// Store a value
    pub fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.observe(&self.metrics.set, || {
            check_key(key)?;
            self.store.set(key.as_bytes(), value)
        })
    }

    /// Read a value; an unknown key is `NotFound`
    pub fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.observe(&self.metrics.get, || {
            check_key(key)?;
            self.store.get(key.as_bytes())?.ok_or(KvError::NotFound)
        })
    }

    /// Delete a key
    pub fn delete(&self, key: &str) -> Result<()> {
        self.observe(&self.metrics.delete, || {
            check_key(key)?;
            self.store.delete(key.as_bytes()).map(|_| ())
        })
    }

    /// Entries under `prefix`, at most `limit` of them
    ///
    /// A limit of 0 or above [`MAX_SCAN_LIMIT`] becomes
    /// [`DEFAULT_SCAN_LIMIT`].
    pub fn scan(&self, prefix: &str, limit: usize) -> Result<BTreeMap<String, Vec<u8>>> {
        self.observe(&self.metrics.scan, || {
            let entries = self
                .store
                .scan_with_values_limit(prefix.as_bytes(), normalize_limit(limit))?;

            Ok(entries
                .into_iter()
                .map(|(k, v)| (String::from_utf8_lossy(&k).into_owned(), v))
                .collect())
        })
    }

    /// Store several values
    pub fn mset(&self, entries: &HashMap<String, Vec<u8>>) -> Result<()> {
        self.observe(&self.metrics.mset, || {
            if entries.is_empty() {
                return Err(KvError::EmptyBatch);
            }
            self.store
                .mset(entries.iter().map(|(k, v)| (k.as_bytes(), v.as_slice())))
        })
    }

    /// Read several values; missing keys are omitted
    pub fn mget(&self, keys: &[String]) -> Result<HashMap<String, Vec<u8>>> {
        self.observe(&self.metrics.mget, || {
            if keys.is_empty() {
                return Err(KvError::EmptyBatch);
            }
            let mut found = self.store.mget(keys.iter().map(String::as_bytes))?;

            Ok(keys
                .iter()
                .filter_map(|k| found.remove(k.as_bytes()).map(|v| (k.clone(), v)))
                .collect())
        })
    }

    /// Delete several keys
    pub fn mdelete(&self, keys: &[String]) -> Result<()> {
        self.observe(&self.metrics.mdelete, || {
            if keys.is_empty() {
                return Err(KvError::EmptyBatch);
            }
            self.store.mdelete(keys.iter().map(String::as_bytes)).map(|_| ())
        })
    }

    /// The persisted configuration
    pub fn get_config(&self) -> Result<Config> {
        self.store.get_config()
    }

    /// Persist and apply a configuration
    pub fn update_config(&self, config: Config) -> Result<()> {
        self.observe(&self.metrics.config_updates, || self.store.update_config(config))
    }

    /// Cheap liveness check that touches the database
    pub fn health_check(&self) -> Result<Health> {
        self.observe(&self.metrics.health_checks, || {
            let estimated_keys = self.store.estimated_key_count()?;

            Ok(Health {
                eviction_running: self.store.eviction_running(),
                estimated_keys,
                disk_usage: self.metrics.disk_usage(),
            })
        })
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Count, time and classify one call
    fn observe<T, F>(&self, op: &OpMetrics, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let start = Instant::now();
        op.calls.increment();

        let result = f();

        op.latency.observe(start.elapsed());
        if let Err(e) = &result {
            op.errors.increment();
            match e.kind() {
                ErrorKind::NotFound => self.metrics.not_found.increment(),
                ErrorKind::Evicted => self.metrics.evicted_reads.increment(),
                _ => {}
            }
            tracing::debug!(error = %e, kind = e.label(), "request failed");
        }

        result
    }
}

fn check_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(KvError::EmptyKey);
    }
    Ok(())
}

fn normalize_limit(limit: usize) -> usize {
    if limit == 0 || limit > MAX_SCAN_LIMIT {
        DEFAULT_SCAN_LIMIT
    } else {
        limit
    }
}
