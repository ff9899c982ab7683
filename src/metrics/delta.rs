//! Conversion of cumulative counters into per-interval values.
//!
//! CPU time buckets and network counters only ever grow, so a single reading
//! says little. The types here remember the previous reading and report the
//! change since then. The very first reading has no baseline and is compared
//! against itself, which makes every derived value zero.

use std::collections::HashMap;

use crate::error::{MetricsError, Result};
use crate::metrics::data::{BandwidthStats, CpuPercent};

/// Cumulative CPU time per category, in clock ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
    pub guest: u64,
    pub guest_nice: u64,
}

impl CpuTimes {
    /// Sum of all categories.
    pub fn total(&self) -> u64 {
        self.user
            + self.system
            + self.nice
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
            + self.guest
            + self.guest_nice
            + self.idle
    }

    /// Parse the aggregate `cpu` line of `/proc/stat`.
    pub fn parse_proc_stat(content: &str) -> Result<Self> {
        let line = content
            .lines()
            .find(|line| line.split_whitespace().next() == Some("cpu"))
            .ok_or_else(|| MetricsError::parse_error("/proc/stat: no aggregate cpu line"))?;

        let fields: Vec<u64> = line
            .split_whitespace()
            .skip(1)
            .map(|v| v.parse::<u64>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| MetricsError::parse_error(format!("/proc/stat: {}", e)))?;

        if fields.len() < 4 {
            return Err(MetricsError::parse_error(format!(
                "/proc/stat: expected at least 4 cpu fields, got {}",
                fields.len()
            )));
        }

        let field = |i: usize| fields.get(i).copied().unwrap_or(0);

        Ok(Self {
            user: field(0),
            nice: field(1),
            system: field(2),
            idle: field(3),
            iowait: field(4),
            irq: field(5),
            softirq: field(6),
            steal: field(7),
            guest: field(8),
            guest_nice: field(9),
        })
    }
}

/// Percentage of the elapsed CPU time spent in each category between two
/// readings. All zero when no time elapsed.
pub fn cpu_percent(previous: &CpuTimes, current: &CpuTimes) -> CpuPercent {
    let elapsed = current.total().saturating_sub(previous.total());
    if elapsed == 0 {
        return CpuPercent::default();
    }

    let share = |now: u64, before: u64| now.saturating_sub(before) as f64 * 100.0 / elapsed as f64;

    CpuPercent {
        user: share(current.user, previous.user),
        system: share(current.system, previous.system),
        nice: share(current.nice, previous.nice),
        iowait: share(current.iowait, previous.iowait),
        irq: share(current.irq, previous.irq),
        softirq: share(current.softirq, previous.softirq),
        steal: share(current.steal, previous.steal),
        idle: share(current.idle, previous.idle),
    }
}

/// Remembers the last CPU reading.
#[derive(Debug, Default)]
pub struct CpuDelta {
    previous: Option<CpuTimes>,
}

impl CpuDelta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare `current` with the previous reading, then keep it as the new
    /// baseline.
    pub fn update(&mut self, current: CpuTimes) -> CpuPercent {
        let previous = self.previous.unwrap_or(current);
        let percent = cpu_percent(&previous, &current);
        self.previous = Some(current);
        percent
    }
}

/// Cumulative traffic counters of one network interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetCounters {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
}

impl NetCounters {
    /// Traffic since `previous`. Counters that went backwards (interface
    /// reset) report zero.
    pub fn delta_since(&self, previous: &NetCounters) -> BandwidthStats {
        BandwidthStats {
            bytes_sent: self.bytes_sent.saturating_sub(previous.bytes_sent),
            bytes_recv: self.bytes_recv.saturating_sub(previous.bytes_recv),
            packets_sent: self.packets_sent.saturating_sub(previous.packets_sent),
            packets_recv: self.packets_recv.saturating_sub(previous.packets_recv),
        }
    }
}

/// Remembers the last counters of every interface seen so far.
///
/// Interfaces are never forgotten, so an interface that disappears and comes
/// back is compared against its last known counters.
#[derive(Debug, Default)]
pub struct NetDelta {
    previous: HashMap<String, NetCounters>,
}

impl NetDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, name: &str, current: NetCounters) -> BandwidthStats {
        let previous = self
            .previous
            .insert(name.to_string(), current)
            .unwrap_or(current);
        current.delta_since(&previous)
    }

    /// Number of interfaces with a baseline.
    pub fn len(&self) -> usize {
        self.previous.len()
    }

    pub fn is_empty(&self) -> bool {
        self.previous.is_empty()
    }
}
