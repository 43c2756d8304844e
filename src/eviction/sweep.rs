//! Eviction sweep
//!
//! One check-and-evict cycle. The creation-time index only proposes
//! candidates; the primary record decides whether a candidate is evicted.

use std::ops::ControlFlow;
use std::sync::Arc;

use crate::error::Result;
use crate::index::{PrimaryIndex, Record};
use crate::metrics::Metrics;

use super::manager::EvictionPolicy;
use super::usage::UsageProbe;

/// Outcome of one cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvictionReport {
    /// Measured usage fraction (None when the check was skipped)
    pub usage: Option<f64>,

    /// Whether usage crossed the threshold and a sweep ran
    pub triggered: bool,

    /// Candidates taken from the time index
    pub scanned: usize,

    /// Keys moved from DiskRef to Evicted
    pub evicted: usize,

    /// Candidates whose eviction failed
    pub failed: usize,
}

/// What validation decided for one candidate
enum Verdict {
    Evicted,
    Skipped,
}

/// Runs check-and-evict cycles against the shared indexes
pub struct Sweeper {
    /// Primary index (also gives access to blobs and the time index)
    index: Arc<PrimaryIndex>,

    /// Filesystem usage source
    probe: Arc<dyn UsageProbe>,

    metrics: Arc<Metrics>,
}

impl Sweeper {
    pub fn new(index: Arc<PrimaryIndex>, probe: Arc<dyn UsageProbe>, metrics: Arc<Metrics>) -> Self {
        Self {
            index,
            probe,
            metrics,
        }
    }

    /// Measure usage and evict if it exceeds the policy threshold
    pub fn check_and_evict(&self, policy: &EvictionPolicy) -> Result<EvictionReport> {
        self.metrics.eviction_cycles.increment();

        let usage = self.probe.usage_fraction(self.index.blobs().root())?;
        self.metrics.set_disk_usage(usage);

        if usage <= policy.disk_usage_threshold {
            tracing::trace!(usage, threshold = policy.disk_usage_threshold, "below threshold");
            return Ok(EvictionReport {
                usage: Some(usage),
                ..EvictionReport::default()
            });
        }

        tracing::info!(
            usage,
            threshold = policy.disk_usage_threshold,
            batch_size = policy.batch_size,
            "disk usage above threshold, evicting"
        );

        let mut report = self.evict(policy.batch_size)?;
        report.usage = Some(usage);
        Ok(report)
    }

    /// Evict up to `batch_size` disk-backed keys, oldest first
    ///
    /// Per-key failures are logged and counted; only a failure to read the
    /// time index aborts the sweep.
    pub fn evict(&self, batch_size: usize) -> Result<EvictionReport> {
        let mut report = EvictionReport {
            triggered: true,
            ..EvictionReport::default()
        };
        if batch_size == 0 {
            return Ok(report);
        }

        self.index.time_index().scan_oldest(|timestamp, key| {
            report.scanned += 1;

            match self.validate_and_evict(key) {
                Ok(Verdict::Evicted) => {
                    report.evicted += 1;
                    self.metrics.evictions.increment();
                }
                Ok(Verdict::Skipped) => {}
                Err(e) => {
                    report.failed += 1;
                    self.metrics.eviction_failures.increment();
                    tracing::warn!(
                        key = %String::from_utf8_lossy(key),
                        timestamp,
                        error = %e,
                        "failed to evict key"
                    );
                }
            }

            if report.evicted >= batch_size {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;

        tracing::info!(
            scanned = report.scanned,
            evicted = report.evicted,
            failed = report.failed,
            "eviction sweep finished"
        );
        Ok(report)
    }

    /// Re-read the candidate's record and evict it if it is disk-backed
    ///
    /// The record is marked Evicted before the blob is deleted, so a
    /// failure in between leaks a blob instead of leaving a dangling
    /// reference.
    fn validate_and_evict(&self, key: &[u8]) -> Result<Verdict> {
        let blob_id = match self.index.get_record(key)? {
            Some(Record::DiskRef(id)) => id,
            Some(Record::Inline(_)) | Some(Record::Evicted) | None => return Ok(Verdict::Skipped),
        };

        self.index.put_record(key, &Record::Evicted)?;
        self.index.blobs().delete(&blob_id)?;

        if let Err(e) = self.index.time_index().remove(key) {
            tracing::warn!(
                key = %String::from_utf8_lossy(key),
                error = %e,
                "evicted key left in time index"
            );
        }

        tracing::debug!(key = %String::from_utf8_lossy(key), blob_id = %blob_id, "evicted");
        Ok(Verdict::Evicted)
    }
}
