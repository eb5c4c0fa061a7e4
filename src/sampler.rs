//! Host resource snapshots taken around every trial.

use serde::Serialize;

use crate::error::Result;

/// Cumulative CPU ticks and used memory at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResourceSnapshot {
    /// Ticks spent in user mode since boot.
    pub cpu_user: u64,
    /// Ticks spent in kernel mode since boot.
    pub cpu_system: u64,
    /// All ticks since boot, idle included.
    pub cpu_total: u64,
    /// Used memory in bytes.
    pub memory_used: u64,
}

/// Source of resource snapshots. Failures abort the run.
pub trait ResourceSampler {
    /// Take a snapshot now.
    fn sample(&mut self) -> Result<ResourceSnapshot>;
}

/// Samples the whole host: memory via `sysinfo`, CPU ticks from
/// `/proc/stat` via `procfs` on Linux (zero elsewhere).
pub struct HostSampler {
    system: sysinfo::System,
}

impl HostSampler {
    /// Create a sampler.
    pub fn new() -> Self {
        HostSampler {
            system: sysinfo::System::new(),
        }
    }
}

impl Default for HostSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceSampler for HostSampler {
    fn sample(&mut self) -> Result<ResourceSnapshot> {
        self.system.refresh_memory();
        let (cpu_user, cpu_system, cpu_total) = cpu_ticks()?;
        Ok(ResourceSnapshot {
            cpu_user,
            cpu_system,
            cpu_total,
            memory_used: self.system.used_memory(),
        })
    }
}

#[cfg(target_os = "linux")]
fn cpu_ticks() -> Result<(u64, u64, u64)> {
    use procfs::CurrentSI;

    let cpu = procfs::KernelStats::current()?.total;
    Ok((cpu.user, cpu.system, total_ticks(&cpu)))
}

#[cfg(not(target_os = "linux"))]
fn cpu_ticks() -> Result<(u64, u64, u64)> {
    Ok((0, 0, 0))
}

// Guest time is already folded into user, so the total stops at steal.
#[cfg(target_os = "linux")]
fn total_ticks(cpu: &procfs::CpuTime) -> u64 {
    let optional: u64 = [cpu.iowait, cpu.irq, cpu.softirq, cpu.steal]
        .into_iter()
        .flatten()
        .sum();
    cpu.user + cpu.nice + cpu.system + cpu.idle + optional
}
