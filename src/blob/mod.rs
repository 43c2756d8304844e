//! Blob Store Module
//!
//! Content-addressed file storage for values too large to keep inline in
//! the primary index.
//!
//! ## Responsibilities
//! - Persist opaque byte blobs under a name derived from their content
//! - Load and delete blobs by id
//! - No indexing, no reference counting
//!
//! ## Layout
//! ```text
//! {disk_path}/
//!   ├── 2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824
//!   ├── 486ea46224d1bb4fb680f34f7c9ad96a8f24ec88be73ea8e5a6c65260e9cb8a7
//!   └── ...            (one file per distinct content, named by SHA-256 hex)
//! ```

mod store;

pub use store::{blob_id_for, BlobStore};
