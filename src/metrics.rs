//! Metrics
//!
//! Per-instance counters and gauges. A [`Metrics`] registry is built once
//! by the embedding process and handed to the store and the service by
//! `Arc`, so independent instances (and tests) never share state.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

/// Monotonically increasing counter
#[derive(Debug)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, value: u64) {
        self.0.fetch_add(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

/// Gauge that can increase or decrease
#[derive(Debug)]
pub struct Gauge(AtomicI64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicI64::new(0))
    }

    pub fn add(&self, value: i64) {
        self.0.fetch_add(value, Ordering::Relaxed);
    }

    pub fn sub(&self, value: i64) {
        self.0.fetch_sub(value, Ordering::Relaxed);
    }

    pub fn set(&self, value: i64) {
        self.0.store(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for Gauge {
    fn default() -> Self {
        Self::new()
    }
}

/// Accumulated latency: sample count and total time
#[derive(Debug, Default)]
pub struct LatencyStat {
    count: Counter,
    total_micros: Counter,
}

impl LatencyStat {
    pub fn observe(&self, elapsed: Duration) {
        self.count.increment();
        self.total_micros.add(elapsed.as_micros() as u64);
    }

    pub fn count(&self) -> u64 {
        self.count.value()
    }

    /// Mean latency, zero when nothing was observed
    pub fn mean(&self) -> Duration {
        let count = self.count.value();
        if count == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(self.total_micros.value() / count)
    }
}

/// Counters, errors and latencies of one operation kind
#[derive(Debug, Default)]
pub struct OpMetrics {
    pub calls: Counter,
    pub errors: Counter,
    pub latency: LatencyStat,
}

/// Metrics registry for one store/service pair
#[derive(Debug, Default)]
pub struct Metrics {
    // Operations
    pub set: OpMetrics,
    pub get: OpMetrics,
    pub delete: OpMetrics,
    pub scan: OpMetrics,
    pub mset: OpMetrics,
    pub mget: OpMetrics,
    pub mdelete: OpMetrics,
    pub config_updates: OpMetrics,
    pub health_checks: OpMetrics,

    // Error kinds worth telling apart
    pub not_found: Counter,
    pub evicted_reads: Counter,

    // Eviction
    pub eviction_cycles: Counter,
    pub evictions: Counter,
    pub eviction_failures: Counter,

    // State
    pub keys: Gauge,
    /// Last measured disk usage in basis points (0 - 10000)
    pub disk_usage_bp: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a disk usage fraction
    pub fn set_disk_usage(&self, fraction: f64) {
        self.disk_usage_bp.set((fraction * 10_000.0).round() as i64);
    }

    /// Last recorded disk usage fraction
    pub fn disk_usage(&self) -> f64 {
        self.disk_usage_bp.value() as f64 / 10_000.0
    }
}
