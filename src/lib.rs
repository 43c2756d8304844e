//! # tierkv
//!
//! A key-value cache on top of RocksDB with:
//! - Inline storage for small values, content-addressed blob files for
//!   large ones
//! - A creation-time index giving oldest-first eviction candidates
//! - A background eviction loop that reclaims blob space once the disk
//!   fills past a threshold
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     KvService (service)                      │
//! │           string keys · scan limits · metrics                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Store (façade)                          │
//! └──────┬──────────────────────┬───────────────────────┬───────┘
//!        │                      │                       │
//!        ▼                      ▼                       ▼
//! ┌─────────────┐       ┌───────────────┐      ┌─────────────────┐
//! │ PrimaryIndex│──────▶│ CreationTime  │◀─────│ EvictionManager │
//! │  (RocksDB)  │       │ Index (RocksDB│      │ (thread + tick) │
//! └──────┬──────┘       └───────────────┘      └────────┬────────┘
//!        │                                              │
//!        ▼                                              │
//! ┌─────────────┐                                       │
//! │  BlobStore  │◀──────────────────────────────────────┘
//! │ (files)     │
//! └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod metrics;

pub mod blob;
pub mod index;
pub mod eviction;
pub mod store;
pub mod service;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{Config, EvictionConfig};
pub use error::{ErrorKind, KvError, Result};
pub use metrics::Metrics;
pub use service::KvService;
pub use store::Store;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of tierkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
