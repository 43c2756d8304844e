//! Eviction Module
//!
//! Reclaims disk space by evicting the oldest disk-backed values once the
//! blob store's filesystem crosses a usage threshold.
//!
//! ## Cycle
//! ```text
//!   tick ──▶ usage probe ──▶ usage > threshold? ──no──▶ wait for next tick
//!                                  │
//!                                 yes
//!                                  ▼
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │ propose:  creation-time index, oldest bucket first           │
//!   │ validate: re-read the primary record of each candidate       │
//!   │ act:      DiskRef → mark Evicted, delete blob, drop time entry│
//!   │           anything else → skip                               │
//!   └──────────────────────────────────────────────────────────────┘
//!          repeat until batch_size evictions or candidates run out
//! ```
//!
//! ## Module Structure
//! - `usage.rs`: filesystem usage probing (`statvfs`)
//! - `sweep.rs`: one check-and-evict cycle
//! - `manager.rs`: background loop and its start/stop state machine

mod manager;
mod sweep;
mod usage;

pub use manager::{EvictionManager, EvictionPolicy};
pub use sweep::{EvictionReport, Sweeper};
pub use usage::{FixedUsage, StatvfsProbe, UsageProbe};
