//! Data structures for collected metrics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::metrics::traits::Snapshot;

/// A single published metric value.
///
/// Whether a metric is an integer or a float is decided by the field it comes
/// from, and publishers use this to pick the kind of cell they store it in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(u64),
    Float(f64),
}

impl Value {
    /// Returns the value as a float, converting integers.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Value::Int(v) => v as f64,
            Value::Float(v) => v,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Value::Float(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
        }
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

/// Flat, sorted view of a snapshot keyed by dotted metric name.
pub type Values = BTreeMap<String, Value>;

/// Milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// One cycle of operating-system metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemStats {
    /// Timestamp when this snapshot was taken (Unix timestamp in milliseconds)
    pub timestamp: u64,
    /// CPU time split over the last interval, in percent
    pub cpu: Option<CpuPercent>,
    /// Load averages
    pub load: Option<LoadStats>,
    /// Virtual memory totals
    pub memory: Option<MemStats>,
    /// Swap totals
    pub swap: Option<SwapStats>,
    /// Usage per mount point
    pub disks: BTreeMap<String, DiskStats>,
    /// Traffic per network interface over the last interval
    pub bandwidth: BTreeMap<String, BandwidthStats>,
}

/// Share of CPU time spent in each category since the previous sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuPercent {
    pub user: f64,
    pub system: f64,
    pub nice: f64,
    pub iowait: f64,
    pub irq: f64,
    pub softirq: f64,
    pub steal: f64,
    pub idle: f64,
}

/// System load averages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadStats {
    pub load1: f64,
    pub load5: f64,
    pub load15: f64,
}

/// Virtual memory totals in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemStats {
    pub total: u64,
    pub available: u64,
    pub used: u64,
}

/// Swap totals in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapStats {
    pub total: u64,
    pub free: u64,
    pub used: u64,
}

/// Disk usage of a single partition in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskStats {
    pub total: u64,
    pub free: u64,
}

/// Network traffic of one interface since the previous sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandwidthStats {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
}

impl SystemStats {
    /// Create an empty snapshot stamped with the current time.
    pub fn new() -> Self {
        Self {
            timestamp: now_millis(),
            ..Default::default()
        }
    }
}

impl Snapshot for SystemStats {
    fn values(&self) -> Values {
        let mut values = Values::new();

        if let Some(cpu) = &self.cpu {
            values.insert("cpu.user".into(), cpu.user.into());
            values.insert("cpu.system".into(), cpu.system.into());
            values.insert("cpu.nice".into(), cpu.nice.into());
            values.insert("cpu.iowait".into(), cpu.iowait.into());
            values.insert("cpu.irq".into(), cpu.irq.into());
            values.insert("cpu.softirq".into(), cpu.softirq.into());
            values.insert("cpu.steal".into(), cpu.steal.into());
            values.insert("cpu.idle".into(), cpu.idle.into());
        }

        if let Some(load) = &self.load {
            values.insert("load.load1".into(), load.load1.into());
            values.insert("load.load5".into(), load.load5.into());
            values.insert("load.load15".into(), load.load15.into());
        }

        if let Some(mem) = &self.memory {
            values.insert("mem.total".into(), mem.total.into());
            values.insert("mem.available".into(), mem.available.into());
            values.insert("mem.used".into(), mem.used.into());
        }

        if let Some(swap) = &self.swap {
            values.insert("swap.total".into(), swap.total.into());
            values.insert("swap.free".into(), swap.free.into());
            values.insert("swap.used".into(), swap.used.into());
        }

        for (mount, disk) in &self.disks {
            values.insert(format!("disk.{}.total", mount), disk.total.into());
            values.insert(format!("disk.{}.free", mount), disk.free.into());
        }

        for (name, net) in &self.bandwidth {
            values.insert(format!("net.{}.bytes_sent", name), net.bytes_sent.into());
            values.insert(format!("net.{}.bytes_recv", name), net.bytes_recv.into());
            values.insert(format!("net.{}.packets_sent", name), net.packets_sent.into());
            values.insert(format!("net.{}.packets_recv", name), net.packets_recv.into());
        }

        values
    }
}

/// One cycle of process and async-runtime metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeStats {
    /// Timestamp when this snapshot was taken (Unix timestamp in milliseconds)
    pub timestamp: u64,
    pub cpu: Option<RuntimeCpuStats>,
    pub tasks: Option<TaskStats>,
    pub memory: Option<ProcessMemStats>,
    pub alloc: Option<AllocStats>,
    pub free: Option<FreeStats>,
    /// Target operating system
    pub os: String,
    /// Target architecture
    pub arch: String,
    /// Version of this crate
    pub version: String,
}

/// CPU-related process counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeCpuStats {
    /// Logical CPUs available to the process
    pub count: u64,
    /// OS threads owned by the process
    pub threads: u64,
    /// Process CPU usage since the previous sample, in percent
    pub usage: f64,
}

/// Async runtime counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    /// Tasks currently alive on the runtime
    pub alive: u64,
    /// Worker threads driving the runtime
    pub workers: u64,
}

/// Process memory footprint in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessMemStats {
    pub rss: u64,
    pub virtual_memory: u64,
}

/// Heap allocation counters reported by the tracking allocator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocStats {
    /// Bytes currently allocated
    pub alloc: u64,
    /// Cumulative bytes allocated
    pub total_alloc: u64,
    /// Cumulative number of allocations
    pub mallocs: u64,
    /// Live allocations (mallocs minus frees)
    pub objects: u64,
}

/// Heap deallocation counters reported by the tracking allocator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeStats {
    /// Cumulative number of deallocations
    pub count: u64,
    /// Cumulative bytes released
    pub bytes: u64,
}

impl RuntimeStats {
    /// Create an empty snapshot stamped with the current time and target tags.
    pub fn new() -> Self {
        Self {
            timestamp: now_millis(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            ..Default::default()
        }
    }

    /// Descriptive tags to attach when writing the values to a TSDB.
    pub fn tags(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("runtime.os".to_string(), self.os.clone()),
            ("runtime.arch".to_string(), self.arch.clone()),
            ("runtime.version".to_string(), self.version.clone()),
        ])
    }
}

impl Snapshot for RuntimeStats {
    fn values(&self) -> Values {
        let mut values = Values::new();

        if let Some(cpu) = &self.cpu {
            values.insert("cpu.count".into(), cpu.count.into());
            values.insert("cpu.threads".into(), cpu.threads.into());
            values.insert("cpu.usage".into(), cpu.usage.into());
        }

        if let Some(tasks) = &self.tasks {
            values.insert("cpu.tasks".into(), tasks.alive.into());
            values.insert("cpu.workers".into(), tasks.workers.into());
        }

        if let Some(mem) = &self.memory {
            values.insert("mem.rss".into(), mem.rss.into());
            values.insert("mem.virtual".into(), mem.virtual_memory.into());
        }

        if let Some(alloc) = &self.alloc {
            values.insert("mem.alloc".into(), alloc.alloc.into());
            values.insert("mem.total_alloc".into(), alloc.total_alloc.into());
            values.insert("mem.mallocs".into(), alloc.mallocs.into());
            values.insert("mem.objects".into(), alloc.objects.into());
        }

        if let Some(free) = &self.free {
            values.insert("mem.free.count".into(), free.count.into());
            values.insert("mem.free.bytes".into(), free.bytes.into());
        }

        values
    }
}
