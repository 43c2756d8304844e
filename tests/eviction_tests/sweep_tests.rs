//! Tests for Sweeper
//!
//! These tests verify:
//! - Cycles only evict when usage is strictly above the threshold
//! - Candidates are taken oldest first and capped at batch_size
//! - Only disk-backed records are evicted; everything else is skipped
//! - An evicted key reads as Evicted, not as missing

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tierkv::blob::BlobStore;
use tierkv::eviction::{EvictionPolicy, FixedUsage, Sweeper};
use tierkv::index::{open_database, CreationTimeIndex, PrimaryIndex, Record};
use tierkv::{KvError, Metrics};

// =============================================================================
// Helper Functions
// =============================================================================

struct Fixture {
    _temp: TempDir,
    index: Arc<PrimaryIndex>,
    usage: Arc<FixedUsage>,
    metrics: Arc<Metrics>,
    sweeper: Sweeper,
}

fn setup_sweeper(usage: f64) -> Fixture {
    let temp = TempDir::new().unwrap();
    let db = open_database(&temp.path().join("db")).unwrap();
    let blobs = Arc::new(BlobStore::open(&temp.path().join("blobs")).unwrap());
    let time_index = Arc::new(CreationTimeIndex::new(db.clone()));
    let index = Arc::new(PrimaryIndex::new(db, blobs, time_index, 16));

    let usage = Arc::new(FixedUsage::new(usage));
    let metrics = Arc::new(Metrics::new());
    let sweeper = Sweeper::new(index.clone(), usage.clone(), metrics.clone());

    Fixture {
        _temp: temp,
        index,
        usage,
        metrics,
        sweeper,
    }
}

fn policy(batch_size: usize) -> EvictionPolicy {
    EvictionPolicy {
        disk_usage_threshold: 0.8,
        check_interval: Duration::from_secs(1),
        batch_size,
    }
}

/// Write a disk-backed key created at `timestamp`; returns its blob id
fn seed_disk_key(index: &PrimaryIndex, key: &[u8], timestamp: u64) -> String {
    let mut value = key.to_vec();
    value.extend_from_slice(&[0xAB; 64]);

    let id = index.blobs().store(&value).unwrap();
    index.put_record(key, &Record::DiskRef(id.clone())).unwrap();
    index.time_index().record_at(timestamp, key).unwrap();
    id
}

// =============================================================================
// Threshold Tests
// =============================================================================

#[test]
fn test_below_threshold_does_nothing() {
    let fx = setup_sweeper(0.5);
    let id = seed_disk_key(&fx.index, b"k", 100);

    let report = fx.sweeper.check_and_evict(&policy(10)).unwrap();

    assert_eq!(report.usage, Some(0.5));
    assert!(!report.triggered);
    assert_eq!(report.evicted, 0);
    assert!(fx.index.blobs().exists(&id));
}

#[test]
fn test_exactly_at_threshold_does_nothing() {
    let fx = setup_sweeper(0.8);
    seed_disk_key(&fx.index, b"k", 100);

    let report = fx.sweeper.check_and_evict(&policy(10)).unwrap();

    assert!(!report.triggered);
    assert!(matches!(fx.index.get_record(b"k").unwrap(), Some(Record::DiskRef(_))));
}

#[test]
fn test_above_threshold_evicts() {
    let fx = setup_sweeper(0.95);
    let id = seed_disk_key(&fx.index, b"k", 100);

    let report = fx.sweeper.check_and_evict(&policy(10)).unwrap();

    assert!(report.triggered);
    assert_eq!(report.evicted, 1);
    assert_eq!(fx.index.get_record(b"k").unwrap(), Some(Record::Evicted));
    assert!(!fx.index.blobs().exists(&id));
}

#[test]
fn test_usage_change_takes_effect_next_cycle() {
    let fx = setup_sweeper(0.1);
    seed_disk_key(&fx.index, b"k", 100);

    assert_eq!(fx.sweeper.check_and_evict(&policy(10)).unwrap().evicted, 0);

    fx.usage.set(0.99);
    assert_eq!(fx.sweeper.check_and_evict(&policy(10)).unwrap().evicted, 1);
}

// =============================================================================
// Ordering and Batch Tests
// =============================================================================

#[test]
fn test_evicts_oldest_first_up_to_batch_size() {
    let fx = setup_sweeper(0.95);
    for ts in [104u64, 100, 103, 101, 102] {
        seed_disk_key(&fx.index, format!("key-{}", ts).as_bytes(), ts);
    }

    let report = fx.sweeper.check_and_evict(&policy(2)).unwrap();

    assert_eq!(report.evicted, 2);
    assert_eq!(fx.index.get_record(b"key-100").unwrap(), Some(Record::Evicted));
    assert_eq!(fx.index.get_record(b"key-101").unwrap(), Some(Record::Evicted));
    for ts in 102..=104 {
        let key = format!("key-{}", ts);
        assert!(matches!(
            fx.index.get_record(key.as_bytes()).unwrap(),
            Some(Record::DiskRef(_))
        ));
    }
}

#[test]
fn test_within_bucket_insertion_order() {
    let fx = setup_sweeper(0.95);
    seed_disk_key(&fx.index, b"first", 100);
    seed_disk_key(&fx.index, b"second", 100);

    fx.sweeper.evict(1).unwrap();

    assert_eq!(fx.index.get_record(b"first").unwrap(), Some(Record::Evicted));
    assert!(matches!(fx.index.get_record(b"second").unwrap(), Some(Record::DiskRef(_))));
}

#[test]
fn test_evicted_keys_leave_time_index() {
    let fx = setup_sweeper(0.95);
    seed_disk_key(&fx.index, b"a", 100);
    seed_disk_key(&fx.index, b"b", 101);

    fx.sweeper.evict(10).unwrap();

    assert_eq!(fx.index.time_index().entry_count().unwrap(), 0);
}

#[test]
fn test_zero_batch_size_evicts_nothing() {
    let fx = setup_sweeper(0.95);
    let id = seed_disk_key(&fx.index, b"k", 100);

    let report = fx.sweeper.check_and_evict(&policy(0)).unwrap();

    assert_eq!(report.scanned, 0);
    assert_eq!(report.evicted, 0);
    assert!(fx.index.blobs().exists(&id));
}

#[test]
fn test_fewer_candidates_than_batch() {
    let fx = setup_sweeper(0.95);
    seed_disk_key(&fx.index, b"only", 100);

    let report = fx.sweeper.evict(50).unwrap();

    assert_eq!(report.scanned, 1);
    assert_eq!(report.evicted, 1);
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_inline_and_missing_candidates_are_skipped() {
    let fx = setup_sweeper(0.95);
    fx.index.put_record(b"inline", &Record::Inline(b"small".to_vec())).unwrap();
    fx.index.time_index().record_at(1, b"inline").unwrap();
    fx.index.time_index().record_at(2, b"ghost").unwrap();
    seed_disk_key(&fx.index, b"disk", 3);

    let report = fx.sweeper.evict(1).unwrap();

    assert_eq!(report.scanned, 3);
    assert_eq!(report.evicted, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(
        fx.index.get_record(b"inline").unwrap(),
        Some(Record::Inline(b"small".to_vec()))
    );
    assert_eq!(fx.index.get_record(b"ghost").unwrap(), None);
    assert_eq!(fx.index.get_record(b"disk").unwrap(), Some(Record::Evicted));
}

#[test]
fn test_already_evicted_candidate_is_skipped() {
    let fx = setup_sweeper(0.95);
    fx.index.put_record(b"gone", &Record::Evicted).unwrap();
    fx.index.time_index().record_at(1, b"gone").unwrap();

    let report = fx.sweeper.evict(10).unwrap();

    assert_eq!(report.scanned, 1);
    assert_eq!(report.evicted, 0);
}

#[test]
fn test_dangling_reference_is_still_evicted() {
    let fx = setup_sweeper(0.95);
    let id = seed_disk_key(&fx.index, b"k", 100);
    fx.index.blobs().delete(&id).unwrap();

    let report = fx.sweeper.evict(10).unwrap();

    assert_eq!(report.evicted, 1);
    assert_eq!(fx.index.get_record(b"k").unwrap(), Some(Record::Evicted));
}

#[test]
fn test_evicted_key_reads_as_evicted() {
    let fx = setup_sweeper(0.95);
    seed_disk_key(&fx.index, b"k", 100);

    fx.sweeper.evict(10).unwrap();

    assert!(matches!(fx.index.get(b"k"), Err(KvError::Evicted { .. })));
}

#[test]
fn test_rewrite_after_eviction_is_readable() {
    let fx = setup_sweeper(0.95);
    seed_disk_key(&fx.index, b"k", 100);
    fx.sweeper.evict(10).unwrap();

    fx.index.set(b"k", b"fresh").unwrap();

    assert_eq!(fx.index.get(b"k").unwrap(), Some(b"fresh".to_vec()));
}

// =============================================================================
// Metrics Tests
// =============================================================================

#[test]
fn test_sweep_updates_metrics() {
    let fx = setup_sweeper(0.9);
    seed_disk_key(&fx.index, b"a", 100);
    seed_disk_key(&fx.index, b"b", 101);

    fx.sweeper.check_and_evict(&policy(10)).unwrap();

    assert_eq!(fx.metrics.eviction_cycles.value(), 1);
    assert_eq!(fx.metrics.evictions.value(), 2);
    assert_eq!(fx.metrics.eviction_failures.value(), 0);
    assert!((fx.metrics.disk_usage() - 0.9).abs() < 1e-4);
}
