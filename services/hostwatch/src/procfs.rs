//! Linux procfs sampling source

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::system::{CpuSnapshot, MemorySnapshot, SystemSource};
use crate::HostwatchError;

/// Reads memory and CPU counters from `<root>/meminfo` and `<root>/stat`
#[derive(Debug, Clone)]
pub struct ProcfsSource {
    root: PathBuf,
}

impl ProcfsSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        tracing::debug!("Created ProcfsSource at {}", root.display());
        Self { root }
    }

    async fn read(&self, name: &str) -> crate::Result<String> {
        let path = self.root.join(name);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| HostwatchError::Sampling(format!("reading {}: {}", path.display(), e)))
    }
}

#[async_trait]
impl SystemSource for ProcfsSource {
    async fn memory(&self) -> crate::Result<MemorySnapshot> {
        parse_meminfo(&self.read("meminfo").await?)
    }

    async fn cpu(&self) -> crate::Result<CpuSnapshot> {
        parse_stat(&self.read("stat").await?)
    }
}

/// Parse `/proc/meminfo` (values in kB) into a byte snapshot
pub fn parse_meminfo(content: &str) -> crate::Result<MemorySnapshot> {
    let fields: HashMap<&str, u64> = content
        .lines()
        .filter_map(|line| {
            let (key, rest) = line.split_once(':')?;
            let kb = rest.split_whitespace().next()?.parse::<u64>().ok()?;
            Some((key.trim(), kb * 1024))
        })
        .collect();

    let field = |key: &str| {
        fields
            .get(key)
            .copied()
            .ok_or_else(|| HostwatchError::Sampling(format!("meminfo has no {} field", key)))
    };

    let total = field("MemTotal")?;
    let free = field("MemFree")?;
    let cached = fields.get("Cached").copied().unwrap_or(0);
    let used = match fields.get("MemAvailable") {
        Some(available) => total.saturating_sub(*available),
        None => {
            let buffers = fields.get("Buffers").copied().unwrap_or(0);
            total
                .saturating_sub(free)
                .saturating_sub(buffers)
                .saturating_sub(cached)
        }
    };

    Ok(MemorySnapshot {
        total,
        used,
        cached,
        free,
    })
}

/// Parse the aggregate `cpu` line of `/proc/stat`
pub fn parse_stat(content: &str) -> crate::Result<CpuSnapshot> {
    let line = content
        .lines()
        .find(|line| line.split_whitespace().next() == Some("cpu"))
        .ok_or_else(|| HostwatchError::Sampling("stat has no aggregate cpu line".to_string()))?;

    let counters = line
        .split_whitespace()
        .skip(1)
        .map(|v| v.parse::<u64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| HostwatchError::Sampling(format!("invalid cpu counter: {}", e)))?;

    if counters.len() < 4 {
        return Err(HostwatchError::Sampling(format!(
            "cpu line has {} counters, expected at least 4",
            counters.len()
        )));
    }

    // user nice system idle iowait irq softirq steal; guest time is already in user
    let total = counters.iter().take(8).sum();

    Ok(CpuSnapshot {
        total,
        user: counters[0],
        system: counters[2],
        idle: counters[3],
    })
}
