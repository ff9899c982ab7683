//! Process and async-runtime metrics sampling.

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::runtime::Handle;

use crate::error::{MetricsError, Result};
use crate::metrics::alloc::TrackingAllocator;
use crate::metrics::config::RuntimeConfig;
use crate::metrics::data::*;
use crate::metrics::system::read_group;
use crate::metrics::traits::Sampler;

/// Samples the current process: CPU, threads, memory footprint, tokio task
/// counts and, when a [`TrackingAllocator`] is attached, heap counters.
pub struct RuntimeSampler {
    config: RuntimeConfig,
    system: System,
    pid: Option<Pid>,
    runtime: Option<Handle>,
    allocator: Option<&'static TrackingAllocator>,
}

impl Default for RuntimeSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeSampler {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            config,
            system: System::new(),
            pid: sysinfo::get_current_pid().ok(),
            runtime: None,
            allocator: None,
        }
    }

    /// Report heap counters from `allocator`, which must be the installed
    /// global allocator for the figures to mean anything.
    pub fn with_allocator(mut self, allocator: &'static TrackingAllocator) -> Self {
        self.allocator = Some(allocator);
        self
    }

    /// Report task counts of `handle` instead of the runtime the sampler
    /// happens to be called from.
    pub fn with_runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    fn refresh_process(&mut self) -> Result<Pid> {
        let pid = self
            .pid
            .ok_or_else(|| MetricsError::unavailable("current process id"))?;

        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            ProcessRefreshKind::new().with_cpu().with_memory(),
        );

        Ok(pid)
    }

    fn cpu_stats(&self, pid: Pid) -> Result<RuntimeCpuStats> {
        let process = self
            .system
            .process(pid)
            .ok_or_else(|| MetricsError::unavailable("process cpu usage"))?;

        let count = std::thread::available_parallelism()
            .map(|n| n.get() as u64)
            .unwrap_or(1);

        Ok(RuntimeCpuStats {
            count,
            threads: thread_count().unwrap_or(0),
            usage: process.cpu_usage() as f64,
        })
    }

    fn memory_stats(&self, pid: Pid) -> Result<ProcessMemStats> {
        let process = self
            .system
            .process(pid)
            .ok_or_else(|| MetricsError::unavailable("process memory"))?;

        Ok(ProcessMemStats {
            rss: process.memory(),
            virtual_memory: process.virtual_memory(),
        })
    }

    fn task_stats(&self) -> Result<TaskStats> {
        let handle = match &self.runtime {
            Some(handle) => handle.clone(),
            None => Handle::try_current()
                .map_err(|_| MetricsError::unavailable("no tokio runtime on this thread"))?,
        };

        let metrics = handle.metrics();
        Ok(TaskStats {
            alive: metrics.num_alive_tasks() as u64,
            workers: metrics.num_workers() as u64,
        })
    }

    fn allocator(&self) -> Result<&'static TrackingAllocator> {
        self.allocator
            .ok_or_else(|| MetricsError::unavailable("no tracking allocator attached"))
    }
}

impl Sampler for RuntimeSampler {
    type Output = RuntimeStats;

    fn sample(&mut self) -> RuntimeStats {
        let mut stats = RuntimeStats::new();

        let pid = if self.config.enable_cpu || self.config.enable_mem {
            read_group("process", self.refresh_process())
        } else {
            None
        };

        if self.config.enable_cpu {
            stats.cpu = pid.and_then(|pid| read_group("cpu", self.cpu_stats(pid)));
            stats.tasks = read_group("tasks", self.task_stats());
        }

        if self.config.enable_mem {
            stats.memory = pid.and_then(|pid| read_group("mem", self.memory_stats(pid)));
            stats.alloc = read_group("alloc", self.allocator().map(|a| a.alloc_stats()));
            if self.config.collects_free() {
                stats.free = read_group("free", self.allocator().map(|a| a.free_stats()));
            }
        }

        stats
    }
}

/// Number of OS threads in this process.
#[cfg(target_os = "linux")]
fn thread_count() -> Result<u64> {
    let status = std::fs::read_to_string("/proc/self/status")?;
    parse_thread_count(&status)
}

#[cfg(not(target_os = "linux"))]
fn thread_count() -> Result<u64> {
    Err(MetricsError::unavailable("thread count"))
}

/// Extract the `Threads:` field of a `/proc/<pid>/status` file.
pub fn parse_thread_count(status: &str) -> Result<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("Threads:"))
        .ok_or_else(|| MetricsError::parse_error("/proc/self/status: no Threads field"))?
        .trim()
        .parse::<u64>()
        .map_err(|e| MetricsError::parse_error(format!("/proc/self/status: {}", e)))
}
