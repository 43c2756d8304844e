//! Disk usage probing

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Result;

/// Reports how full the filesystem holding a path is
pub trait UsageProbe: Send + Sync {
    /// Used fraction of the filesystem, 0.0 - 1.0
    fn usage_fraction(&self, path: &Path) -> Result<f64>;
}

/// Queries the filesystem with `statvfs`
///
/// Usage is computed the way `df` does: used / (used + available to
/// unprivileged users), so reserved blocks count as full.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatvfsProbe;

impl UsageProbe for StatvfsProbe {
    #[cfg(unix)]
    fn usage_fraction(&self, path: &Path) -> Result<f64> {
        use nix::errno::Errno;
        use nix::sys::statvfs::statvfs;

        let stat = match statvfs(path) {
            Ok(stat) => stat,
            Err(Errno::ENOENT) => return Ok(0.0),
            Err(errno) => return Err(io::Error::from(errno).into()),
        };

        let block = stat.fragment_size() as f64;
        let total = stat.blocks() as f64 * block;
        let free = stat.blocks_free() as f64 * block;
        let avail = stat.blocks_available() as f64 * block;

        let used = total - free;
        let capacity = used + avail;
        if capacity <= 0.0 {
            return Ok(0.0);
        }

        Ok((used / capacity).clamp(0.0, 1.0))
    }

    #[cfg(not(unix))]
    fn usage_fraction(&self, path: &Path) -> Result<f64> {
        tracing::debug!(path = %path.display(), "disk usage probing unsupported on this platform");
        Ok(0.0)
    }
}

/// A probe that reports a settable, constant usage
///
/// Useful for driving eviction deterministically.
#[derive(Debug)]
pub struct FixedUsage(AtomicU64);

impl FixedUsage {
    pub fn new(fraction: f64) -> Self {
        Self(AtomicU64::new(fraction.to_bits()))
    }

    pub fn set(&self, fraction: f64) {
        self.0.store(fraction.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}

impl UsageProbe for FixedUsage {
    fn usage_fraction(&self, _path: &Path) -> Result<f64> {
        Ok(self.get())
    }
}
