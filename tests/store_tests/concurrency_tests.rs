//! Concurrency tests for Store
//!
//! Many writers and readers share one store while the eviction loop runs.

use std::sync::Arc;
use std::thread;

use tierkv::{KvError, Store};

use crate::common::{open_store, open_store_with, test_config, value_of, TestStore};

// =============================================================================
// Helper Functions
// =============================================================================

const THREADS: usize = 8;
const KEYS_PER_THREAD: usize = 50;

fn thread_key(thread: usize, i: usize) -> Vec<u8> {
    format!("t{}-k{:03}", thread, i).into_bytes()
}

/// 64 bytes, distinct for every (thread, round)
fn unique_value(thread: usize, round: usize) -> Vec<u8> {
    let mut value = format!("{:02}-{:04}", thread, round).into_bytes();
    value.resize(64, b'.');
    value
}

fn shared(ts: TestStore) -> (tempfile::TempDir, Arc<Store>) {
    let TestStore { dir, store, .. } = ts;
    (dir, Arc::new(store))
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn test_concurrent_sets_are_all_visible() {
    let (_dir, store) = shared(open_store(32));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..KEYS_PER_THREAD {
                    // Alternate inline and disk-backed values
                    let len = if i % 2 == 0 { 8 } else { 64 };
                    store.set(&thread_key(t, i), &value_of(len, t as u8)).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    for t in 0..THREADS {
        for i in 0..KEYS_PER_THREAD {
            let len = if i % 2 == 0 { 8 } else { 64 };
            assert_eq!(store.get(&thread_key(t, i)).unwrap(), Some(value_of(len, t as u8)));
        }
    }
    assert_eq!(store.scan(b"t").unwrap().len(), THREADS * KEYS_PER_THREAD);
    assert_eq!(store.time_index().entry_count().unwrap(), THREADS * KEYS_PER_THREAD);
}

#[test]
fn test_concurrent_readers_and_writers_same_key() {
    let (_dir, store) = shared(open_store(16));
    store.set(b"hot", &unique_value(99, 0)).unwrap();

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for round in 0..50 {
                    store.set(b"hot", &unique_value(t, round)).unwrap();
                }
            })
        })
        .collect();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..50 {
                    // Overwrites never remove a blob a reader may still load
                    let value = store.get(b"hot").unwrap().unwrap();
                    assert_eq!(value.len(), 64);
                }
            })
        })
        .collect();

    for handle in writers.into_iter().chain(readers) {
        handle.join().unwrap();
    }

    assert_eq!(store.get(b"hot").unwrap().map(|v| v.len()), Some(64));
}

#[test]
fn test_sets_while_evicting() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = test_config(&dir, 16);
    let ts = open_store_with(dir, config);
    ts.usage.set(0.99);
    let (_dir, store) = shared(ts);

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 0..200 {
                store.set(format!("w-{:03}", i).as_bytes(), &value_of(40, i as u8)).unwrap();
            }
        })
    };
    let evictor = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for _ in 0..20 {
                store.run_eviction_cycle().unwrap();
            }
        })
    };

    writer.join().unwrap();
    evictor.join().unwrap();

    // Every key is either readable or reported as evicted
    for i in 0..200 {
        match store.get(format!("w-{:03}", i).as_bytes()) {
            Ok(Some(value)) => assert_eq!(value, value_of(40, i as u8)),
            Err(KvError::Evicted { .. }) => {}
            other => panic!("unexpected result for w-{:03}: {:?}", i, other.map(|v| v.map(|v| v.len()))),
        }
    }
}
