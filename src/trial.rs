//! Measurement records.

use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::sampler::ResourceSnapshot;

/// How the payload travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrialKind {
    /// Flooded over a byte stream.
    Raw,
    /// Posted as HTTP request bodies.
    #[serde(rename = "HTTP")]
    Http,
}

impl TrialKind {
    /// Label used in CSV output.
    pub fn as_str(&self) -> &'static str {
        match self {
            TrialKind::Raw => "Raw",
            TrialKind::Http => "HTTP",
        }
    }
}

fn micros<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_micros() as u64)
}

/// One completed batch for one payload size.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trial {
    /// Protocol label, e.g. `"HTTP/2 (Multiplex)"`.
    pub protocol: String,
    /// Raw or HTTP.
    pub kind: TrialKind,
    /// Environment label from the command line.
    pub environment: String,
    /// Number of transfers in the batch.
    pub files: usize,
    /// Time to establish the connection.
    #[serde(rename = "setup_us", serialize_with = "micros")]
    pub setup: Duration,
    /// Time from the start of setup until the probe was answered.
    #[serde(rename = "first_byte_us", serialize_with = "micros")]
    pub first_byte: Duration,
    /// Bytes per transfer.
    pub size: usize,
    /// Wall-clock time of the whole batch.
    #[serde(rename = "duration_us", serialize_with = "micros")]
    pub duration: Duration,
    /// Host resources consumed while the trial ran.
    #[serde(flatten)]
    pub resources: ResourceUsage,
}

/// Host resource consumption between two snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResourceUsage {
    /// CPU ticks spent in user mode.
    pub cpu_user: u64,
    /// CPU ticks spent in kernel mode.
    pub cpu_system: u64,
    /// All CPU ticks elapsed.
    pub cpu_total: u64,
    /// Change in used memory, bytes.
    pub memory_delta: i64,
    /// Used memory at the second snapshot, bytes.
    pub memory_used: u64,
}

impl ResourceUsage {
    /// Usage from `before` to `after`. Tick counters never go negative;
    /// memory can shrink.
    pub fn between(before: &ResourceSnapshot, after: &ResourceSnapshot) -> Self {
        ResourceUsage {
            cpu_user: after.cpu_user.saturating_sub(before.cpu_user),
            cpu_system: after.cpu_system.saturating_sub(before.cpu_system),
            cpu_total: after.cpu_total.saturating_sub(before.cpu_total),
            memory_delta: after.memory_used as i64 - before.memory_used as i64,
            memory_used: after.memory_used,
        }
    }
}

impl Trial {
    /// Bytes per second over the batch, counting every transfer.
    pub fn goodput(&self) -> f64 {
        (self.size as f64 / self.duration.as_secs_f64()) * self.files as f64
    }
}

/// Short size label: `"512 b"`, `"4 kib"`, `"64 mib"`.
pub fn human_size(size: usize) -> String {
    let (value, unit) = if size >= 1 << 20 {
        (size as f64 / (1 << 20) as f64, "mib")
    } else if size >= 1 << 10 {
        (size as f64 / (1 << 10) as f64, "kib")
    } else {
        (size as f64, "b")
    };
    format!("{value:.0} {unit}")
}
