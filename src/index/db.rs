//! Database handle
//!
//! Opens the shared RocksDB instance with every column family the
//! indexes need.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Options, DB};

use crate::error::{KvError, Result};

/// Primary records
pub const CF_DEFAULT: &str = "default";

/// Creation-time buckets
pub const CF_CREATE_TIME: &str = "create_time";

/// Configuration record
pub const CF_METADATA: &str = "metadata";

/// Open (or create) the database at `path`
///
/// Missing column families are created. The returned handle is shared by
/// every index and by the eviction loop; RocksDB handles its own locking.
pub fn open_database(path: &Path) -> Result<Arc<DB>> {
    fs::create_dir_all(path)?;

    let mut opts = Options::default();
    opts.create_if_missing(true);
    opts.create_missing_column_families(true);
    opts.set_write_buffer_size(64 * 1024 * 1024); // 64MB write buffer
    opts.set_max_write_buffer_number(4);
    opts.set_max_background_jobs(4);
    opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

    let cf_descriptors = [CF_DEFAULT, CF_CREATE_TIME, CF_METADATA]
        .into_iter()
        .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
        .collect::<Vec<_>>();

    let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)?;

    tracing::info!(path = %path.display(), "RocksDB opened");

    Ok(Arc::new(db))
}

/// Look up a column family that `open_database` guarantees exists
pub(crate) fn column_family<'a>(db: &'a DB, name: &str) -> Result<&'a ColumnFamily> {
    db.cf_handle(name)
        .ok_or_else(|| KvError::Corruption(format!("missing column family {}", name)))
}
