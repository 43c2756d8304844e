//! Index Module
//!
//! The RocksDB-backed indexes: the primary key→record index and the
//! creation-time index used for eviction ordering.
//!
//! ## Column Families
//! ```text
//! ┌──────────────┬──────────────────────────┬─────────────────────────────┐
//! │ CF           │ Key                      │ Value                       │
//! ├──────────────┼──────────────────────────┼─────────────────────────────┤
//! │ default      │ user key                 │ Record (tag + crc + payload)│
//! │ create_time  │ unix seconds (u64, BE)   │ bincode Vec<key>            │
//! │ metadata     │ "global.config"          │ Config as JSON              │
//! └──────────────┴──────────────────────────┴─────────────────────────────┘
//! ```
//!
//! ## Consistency
//! Blob write, record write and time-index write are three separate
//! steps with no transaction spanning them. The time index is therefore
//! only a hint: anything acting on its contents re-reads the primary
//! record first.

mod db;
mod primary;
mod record;
mod time;

pub use db::{open_database, CF_CREATE_TIME, CF_DEFAULT, CF_METADATA};
pub use primary::PrimaryIndex;
pub use record::Record;
pub use time::CreationTimeIndex;
