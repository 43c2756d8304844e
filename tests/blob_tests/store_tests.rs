//! Tests for BlobStore
//!
//! These tests verify:
//! - Content addressing (id = SHA-256 hex of the content)
//! - Store/load/delete round trips
//! - Idempotent stores and deletes
//! - Not-found reporting

use tempfile::TempDir;
use tierkv::blob::{blob_id_for, BlobStore};
use tierkv::KvError;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_blobs() -> (TempDir, BlobStore) {
    let temp_dir = TempDir::new().unwrap();
    let store = BlobStore::open(&temp_dir.path().join("blobs")).unwrap();
    (temp_dir, store)
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_open_creates_directory() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("nested").join("blobs");

    let store = BlobStore::open(&root).unwrap();

    assert!(root.is_dir());
    assert_eq!(store.root(), root.as_path());
}

#[test]
fn test_store_then_load_returns_identical_bytes() {
    let (_temp, store) = setup_temp_blobs();
    let data: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();

    let id = store.store(&data).unwrap();

    assert_eq!(store.load(&id).unwrap(), data);
}

#[test]
fn test_blob_id_is_content_hash_and_filename() {
    let (_temp, store) = setup_temp_blobs();

    let id = store.store(b"hello").unwrap();

    assert_eq!(id, blob_id_for(b"hello"));
    assert_eq!(id.len(), 64);
    assert!(store.root().join(&id).is_file());
}

#[test]
fn test_identical_content_shares_one_file() {
    let (_temp, store) = setup_temp_blobs();

    let id1 = store.store(b"same bytes").unwrap();
    let id2 = store.store(b"same bytes").unwrap();

    assert_eq!(id1, id2);
    let files = std::fs::read_dir(store.root()).unwrap().count();
    assert_eq!(files, 1);
}

#[test]
fn test_store_empty_blob() {
    let (_temp, store) = setup_temp_blobs();

    let id = store.store(b"").unwrap();

    assert_eq!(store.load(&id).unwrap(), Vec::<u8>::new());
}

// =============================================================================
// Delete Tests
// =============================================================================

#[test]
fn test_delete_then_load_is_not_found() {
    let (_temp, store) = setup_temp_blobs();
    let id = store.store(b"short lived").unwrap();

    store.delete(&id).unwrap();

    assert!(!store.exists(&id));
    assert!(matches!(store.load(&id), Err(KvError::BlobNotFound(_))));
}

#[test]
fn test_delete_is_idempotent() {
    let (_temp, store) = setup_temp_blobs();
    let id = store.store(b"twice").unwrap();

    store.delete(&id).unwrap();
    store.delete(&id).unwrap();
}

#[test]
fn test_delete_never_stored_blob_succeeds() {
    let (_temp, store) = setup_temp_blobs();

    store.delete(&blob_id_for(b"never written")).unwrap();
}

#[test]
fn test_load_never_stored_blob_is_not_found() {
    let (_temp, store) = setup_temp_blobs();

    let result = store.load(&blob_id_for(b"missing"));

    assert!(matches!(result, Err(KvError::BlobNotFound(_))));
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_store_of_identical_content() {
    let (_temp, store) = setup_temp_blobs();
    let store = std::sync::Arc::new(store);
    let data = vec![7u8; 64 * 1024];

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            let data = data.clone();
            std::thread::spawn(move || store.store(&data).unwrap())
        })
        .collect();

    let ids: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(ids.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(store.load(&ids[0]).unwrap(), data);

    // No temp files left behind
    let files = std::fs::read_dir(store.root()).unwrap().count();
    assert_eq!(files, 1);
}
