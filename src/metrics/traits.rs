//! Traits for metrics sampling.

use crate::error::Result;
use crate::metrics::data::{DiskStats, LoadStats, MemStats, SwapStats, Values};
use crate::metrics::delta::{CpuTimes, NetCounters};

/// A record produced by one collection cycle.
pub trait Snapshot {
    /// Flatten the snapshot into dotted `key → value` pairs.
    ///
    /// Groups that could not be read this cycle contribute no keys.
    fn values(&self) -> Values;
}

/// Produces one snapshot per call.
///
/// Samplers own any delta state they need, so each call may update private
/// state (previous counters) but has no other side effects. Reads are
/// best-effort: a failing metric group is left out of the snapshot instead of
/// failing the whole call.
pub trait Sampler: Send {
    type Output: Snapshot + Send + 'static;

    /// Take a sample now.
    fn sample(&mut self) -> Self::Output;
}

/// Raw operating-system readings used by the system sampler.
///
/// Every method reads one metric group and may fail independently of the
/// others. Cumulative counters are returned as-is; turning them into
/// per-interval values is the sampler's job.
pub trait SystemSource: Send {
    /// Cumulative CPU time buckets across all CPUs.
    fn cpu_times(&mut self) -> Result<CpuTimes>;

    /// 1, 5 and 15 minute load averages.
    fn load_average(&mut self) -> Result<LoadStats>;

    /// Update cached memory figures. Called once per cycle before
    /// [`virtual_memory`](Self::virtual_memory) and
    /// [`swap_memory`](Self::swap_memory).
    fn refresh_memory(&mut self) {}

    fn virtual_memory(&mut self) -> Result<MemStats>;

    fn swap_memory(&mut self) -> Result<SwapStats>;

    /// Usage of every currently mounted partition, keyed by mount point.
    fn disk_usage(&mut self) -> Result<Vec<(String, DiskStats)>>;

    /// Cumulative traffic counters of every interface, keyed by name.
    fn net_counters(&mut self) -> Result<Vec<(String, NetCounters)>>;
}
