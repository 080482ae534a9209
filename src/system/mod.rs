//! Host resource sampling.

pub mod sampler;

use std::path::Path;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sysinfo::{CpuExt, CpuRefreshKind, DiskExt, RefreshKind, System, SystemExt};

use crate::error::{MonitorError, Result};

pub use sampler::{Sampler, SamplerHandle};

/// CPU usage is a delta between two refreshes; the first probe waits this long.
const CPU_SETTLE: Duration = Duration::from_millis(500);

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// One host resource reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemSnapshot {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_used_mb: f64,
    pub memory_available_mb: f64,
    pub disk_usage_percent: f64,
    pub timestamp: DateTime<Utc>,
}

/// Something that can read host resource usage.
///
/// Called from the blocking pool, so implementations may block briefly.
pub trait ResourceProbe: Send + 'static {
    fn probe(&mut self) -> Result<SystemSnapshot>;
}

/// `sysinfo`-backed probe of the local host.
pub struct HostProbe {
    sys: System,
    primed: bool,
}

impl HostProbe {
    pub fn new() -> Self {
        let sys = System::new_with_specifics(
            RefreshKind::new()
                .with_cpu(CpuRefreshKind::new().with_cpu_usage())
                .with_memory()
                .with_disks_list(),
        );
        Self { sys, primed: false }
    }

    fn cpu_percent(&mut self) -> f64 {
        if !self.primed {
            self.sys.refresh_cpu();
            thread::sleep(CPU_SETTLE);
            self.primed = true;
        }
        self.sys.refresh_cpu();
        self.sys.global_cpu_info().cpu_usage() as f64
    }

    /// Usage of the filesystem mounted at `/`, or of all disks when none is.
    fn disk_percent(&mut self) -> f64 {
        self.sys.refresh_disks_list();
        self.sys.refresh_disks();

        let disks = self.sys.disks();
        let (total, available) = match disks.iter().find(|d| d.mount_point() == Path::new("/")) {
            Some(root) => (root.total_space(), root.available_space()),
            None => disks.iter().fold((0u64, 0u64), |(t, a), d| {
                (t + d.total_space(), a + d.available_space())
            }),
        };

        if total == 0 {
            tracing::debug!("no disk capacity reported, disk usage recorded as 0");
            return 0.0;
        }
        total.saturating_sub(available) as f64 / total as f64 * 100.0
    }
}

impl Default for HostProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceProbe for HostProbe {
    fn probe(&mut self) -> Result<SystemSnapshot> {
        let cpu_percent = self.cpu_percent();

        self.sys.refresh_memory();
        let total = self.sys.total_memory();
        if total == 0 {
            return Err(MonitorError::Probe("host reported zero total memory".into()));
        }
        let available = self.sys.available_memory();
        let used = self.sys.used_memory();

        Ok(SystemSnapshot {
            cpu_percent,
            memory_percent: total.saturating_sub(available) as f64 / total as f64 * 100.0,
            memory_used_mb: used as f64 / BYTES_PER_MB,
            memory_available_mb: available as f64 / BYTES_PER_MB,
            disk_usage_percent: self.disk_percent(),
            timestamp: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_probe_reports_percentages_in_range() {
        let mut probe = HostProbe::new();
        // some sandboxes hide host memory; a clean error is acceptable there
        if let Ok(s) = probe.probe() {
            assert!((0.0..=100.0).contains(&s.memory_percent));
            assert!((0.0..=100.0).contains(&s.disk_usage_percent));
            assert!(s.cpu_percent >= 0.0);
        }
    }
}
