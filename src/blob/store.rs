//! Blob Store implementation
//!
//! One file per blob, written through a temp file and renamed into place
//! so readers never observe a partially written blob.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use sha2::{Digest, Sha256};

use crate::error::{KvError, Result};

/// Length of a hex-encoded SHA-256 digest
const BLOB_ID_LEN: usize = 64;

/// Compute the blob id (SHA-256 hex digest) of some content
pub fn blob_id_for(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Content-addressed blob storage rooted at a directory
///
/// ## Concurrency:
/// - No in-memory shared state besides the temp-file counter
/// - Concurrent stores of identical content write identical bytes and
///   rename onto the same target, so the last rename wins harmlessly
pub struct BlobStore {
    /// Directory holding one file per blob
    root: PathBuf,

    /// Disambiguates temp files of concurrent writers
    tmp_seq: AtomicU64,
}

impl BlobStore {
    /// Open or create a blob store in the given directory
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;

        tracing::debug!(root = %root.display(), "blob store opened");

        Ok(Self {
            root: root.to_path_buf(),
            tmp_seq: AtomicU64::new(0),
        })
    }

    /// Store a blob, returning its id
    ///
    /// Storing content that already exists overwrites the file with the
    /// same bytes.
    pub fn store(&self, data: &[u8]) -> Result<String> {
        let id = blob_id_for(data);
        let target = self.root.join(&id);

        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = self
            .root
            .join(format!(".{}.{}.{}.tmp", id, std::process::id(), seq));

        if let Err(e) = fs::write(&tmp, data) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&tmp, &target) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        tracing::trace!(blob_id = %id, bytes = data.len(), "blob stored");
        Ok(id)
    }

    /// Load a blob by id
    ///
    /// Returns `BlobNotFound` if the file does not exist.
    pub fn load(&self, id: &str) -> Result<Vec<u8>> {
        let path = self.blob_path(id)?;

        match fs::read(&path) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(KvError::BlobNotFound(id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a blob by id; deleting a missing blob succeeds
    pub fn delete(&self, id: &str) -> Result<()> {
        let path = self.blob_path(id)?;

        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::trace!(blob_id = %id, "blob deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether a blob file is present
    pub fn exists(&self, id: &str) -> bool {
        self.blob_path(id).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Get the root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Resolve an id to its file, rejecting anything that is not a digest
    fn blob_path(&self, id: &str) -> Result<PathBuf> {
        let valid = id.len() == BLOB_ID_LEN && id.bytes().all(|b| b.is_ascii_hexdigit());
        if !valid {
            return Err(KvError::Corruption(format!("invalid blob id {:?}", id)));
        }
        Ok(self.root.join(id))
    }
}
