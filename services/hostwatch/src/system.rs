//! Host sampling trait and snapshot types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::HostwatchError;

/// Bytes per gigabyte (1024-based)
pub const GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Bytes per megabyte (1024-based)
pub const MB: f64 = 1024.0 * 1024.0;

/// Instantaneous memory usage, in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub total: u64,
    pub used: u64,
    pub cached: u64,
    pub free: u64,
}

impl MemorySnapshot {
    /// Memory not in use (`total - used`), in bytes
    pub fn unused(&self) -> u64 {
        self.total.saturating_sub(self.used)
    }
}

/// Cumulative CPU time counters since boot, in clock ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub total: u64,
    pub user: u64,
    pub system: u64,
    pub idle: u64,
}

/// CPU utilization between two snapshots, in percent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CpuUsage {
    pub user: f64,
    pub system: f64,
    pub idle: f64,
}

impl CpuUsage {
    /// Derive utilization from two counter snapshots.
    ///
    /// Fails when the total counter did not advance, since every percentage
    /// would divide by zero.
    pub fn between(before: &CpuSnapshot, after: &CpuSnapshot) -> crate::Result<Self> {
        let total = after.total.saturating_sub(before.total);
        if total == 0 {
            return Err(HostwatchError::Sampling(format!(
                "CPU counters did not advance (total {} -> {})",
                before.total, after.total
            )));
        }

        let percent = |b: u64, a: u64| a.saturating_sub(b) as f64 / total as f64 * 100.0;

        Ok(Self {
            user: percent(before.user, after.user),
            system: percent(before.system, after.system),
            idle: percent(before.idle, after.idle),
        })
    }
}

/// Source of host memory and CPU counters
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait SystemSource: Send + Sync {
    /// Read an instantaneous memory snapshot
    async fn memory(&self) -> crate::Result<MemorySnapshot>;

    /// Read the cumulative CPU counters
    async fn cpu(&self) -> crate::Result<CpuSnapshot>;
}
