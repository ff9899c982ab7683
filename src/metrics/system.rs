//! Operating-system metrics sampling.

#[cfg(target_os = "linux")]
use std::fs;

use sysinfo::{Disks, Networks, System};
use tracing::debug;

use crate::error::{MetricsError, Result};
use crate::metrics::config::SystemConfig;
use crate::metrics::data::*;
use crate::metrics::delta::{CpuDelta, CpuTimes, NetCounters, NetDelta};
use crate::metrics::traits::{Sampler, SystemSource};

/// Reads the host through sysinfo and `/proc`.
pub struct HostSource {
    system: System,
    disks: Disks,
    networks: Networks,
}

impl Default for HostSource {
    fn default() -> Self {
        Self::new()
    }
}

impl HostSource {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            disks: Disks::new_with_refreshed_list(),
            networks: Networks::new_with_refreshed_list(),
        }
    }
}

impl SystemSource for HostSource {
    #[cfg(target_os = "linux")]
    fn cpu_times(&mut self) -> Result<CpuTimes> {
        let content = fs::read_to_string("/proc/stat")?;
        CpuTimes::parse_proc_stat(&content)
    }

    #[cfg(not(target_os = "linux"))]
    fn cpu_times(&mut self) -> Result<CpuTimes> {
        Err(MetricsError::unavailable("cpu time buckets"))
    }

    #[cfg(target_os = "linux")]
    fn load_average(&mut self) -> Result<LoadStats> {
        let content = fs::read_to_string("/proc/loadavg")?;
        parse_loadavg(&content)
    }

    #[cfg(not(target_os = "linux"))]
    fn load_average(&mut self) -> Result<LoadStats> {
        if cfg!(windows) {
            return Err(MetricsError::unavailable("load average"));
        }
        let avg = System::load_average();
        Ok(LoadStats {
            load1: avg.one,
            load5: avg.five,
            load15: avg.fifteen,
        })
    }

    fn refresh_memory(&mut self) {
        self.system.refresh_memory();
    }

    fn virtual_memory(&mut self) -> Result<MemStats> {
        let total = self.system.total_memory();
        if total == 0 {
            return Err(MetricsError::unavailable("virtual memory"));
        }

        Ok(MemStats {
            total,
            available: self.system.available_memory(),
            used: self.system.used_memory(),
        })
    }

    fn swap_memory(&mut self) -> Result<SwapStats> {
        Ok(SwapStats {
            total: self.system.total_swap(),
            free: self.system.free_swap(),
            used: self.system.used_swap(),
        })
    }

    fn disk_usage(&mut self) -> Result<Vec<(String, DiskStats)>> {
        self.disks.refresh_list();

        Ok(self
            .disks
            .iter()
            .map(|disk| {
                (
                    disk.mount_point().to_string_lossy().to_string(),
                    DiskStats {
                        total: disk.total_space(),
                        free: disk.available_space(),
                    },
                )
            })
            .collect())
    }

    fn net_counters(&mut self) -> Result<Vec<(String, NetCounters)>> {
        self.networks.refresh_list();

        Ok(self
            .networks
            .iter()
            .map(|(name, data)| {
                (
                    name.clone(),
                    NetCounters {
                        bytes_sent: data.total_transmitted(),
                        bytes_recv: data.total_received(),
                        packets_sent: data.total_packets_transmitted(),
                        packets_recv: data.total_packets_received(),
                    },
                )
            })
            .collect())
    }
}

/// Parse the first three fields of `/proc/loadavg`.
pub fn parse_loadavg(content: &str) -> Result<LoadStats> {
    let parts: Vec<&str> = content.split_whitespace().collect();
    if parts.len() < 3 {
        return Err(MetricsError::parse_error(format!(
            "/proc/loadavg: expected 3 fields, got {}",
            parts.len()
        )));
    }

    let field = |s: &str| {
        s.parse::<f64>()
            .map_err(|e| MetricsError::parse_error(format!("/proc/loadavg: {}", e)))
    };

    Ok(LoadStats {
        load1: field(parts[0])?,
        load5: field(parts[1])?,
        load15: field(parts[2])?,
    })
}

/// Keep the value of a group read, or log why it is missing this cycle.
pub(crate) fn read_group<T>(group: &'static str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(group, error = %e, "metric group unavailable");
            None
        }
    }
}

/// Samples OS metrics and turns cumulative counters into per-interval values.
pub struct SystemSampler<S = HostSource> {
    source: S,
    config: SystemConfig,
    cpu: CpuDelta,
    net: NetDelta,
}

impl Default for SystemSampler<HostSource> {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemSampler<HostSource> {
    /// Sample the local host with every group enabled.
    pub fn new() -> Self {
        Self::with_config(SystemConfig::default())
    }

    pub fn with_config(config: SystemConfig) -> Self {
        Self::with_source(HostSource::new(), config)
    }
}

impl<S: SystemSource> SystemSampler<S> {
    /// Sample an arbitrary source.
    pub fn with_source(source: S, config: SystemConfig) -> Self {
        Self {
            source,
            config,
            cpu: CpuDelta::new(),
            net: NetDelta::new(),
        }
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// Interfaces that have a traffic baseline.
    pub fn known_interfaces(&self) -> usize {
        self.net.len()
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

impl<S: SystemSource> Sampler for SystemSampler<S> {
    type Output = SystemStats;

    fn sample(&mut self) -> SystemStats {
        let mut stats = SystemStats::new();

        if self.config.enable_cpu {
            stats.cpu = read_group("cpu", self.source.cpu_times()).map(|t| self.cpu.update(t));
        }

        if self.config.enable_load {
            stats.load = read_group("load", self.source.load_average());
        }

        if self.config.enable_mem {
            self.source.refresh_memory();
            stats.memory = read_group("mem", self.source.virtual_memory());
            stats.swap = read_group("swap", self.source.swap_memory());
        }

        if self.config.enable_disk {
            if let Some(disks) = read_group("disk", self.source.disk_usage()) {
                stats.disks = disks.into_iter().collect();
            }
        }

        if self.config.enable_net {
            if let Some(counters) = read_group("net", self.source.net_counters()) {
                stats.bandwidth = counters
                    .into_iter()
                    .map(|(name, current)| {
                        let delta = self.net.update(&name, current);
                        (name, delta)
                    })
                    .collect();
            }
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Source returning scripted readings, advancing one step per sample.
    struct FakeSource {
        step: u64,
        fail_load: bool,
        extra_interface_from: Option<u64>,
        memory_refreshes: u64,
    }

    impl FakeSource {
        fn new() -> Self {
            Self {
                step: 0,
                fail_load: false,
                extra_interface_from: None,
                memory_refreshes: 0,
            }
        }
    }

    impl SystemSource for FakeSource {
        fn cpu_times(&mut self) -> Result<CpuTimes> {
            self.step += 1;
            Ok(CpuTimes {
                user: 100 * self.step,
                system: 50 * self.step,
                idle: 850 * self.step,
                ..Default::default()
            })
        }

        fn load_average(&mut self) -> Result<LoadStats> {
            if self.fail_load {
                return Err(MetricsError::unavailable("load average"));
            }
            Ok(LoadStats {
                load1: 1.0,
                load5: 0.5,
                load15: 0.25,
            })
        }

        fn refresh_memory(&mut self) {
            self.memory_refreshes += 1;
        }

        fn virtual_memory(&mut self) -> Result<MemStats> {
            Ok(MemStats {
                total: 1024,
                available: 512,
                used: 512,
            })
        }

        fn swap_memory(&mut self) -> Result<SwapStats> {
            Ok(SwapStats::default())
        }

        fn disk_usage(&mut self) -> Result<Vec<(String, DiskStats)>> {
            Err(MetricsError::unavailable("disks"))
        }

        fn net_counters(&mut self) -> Result<Vec<(String, NetCounters)>> {
            let mut counters = vec![(
                "eth0".to_string(),
                NetCounters {
                    bytes_sent: 1000 * self.step,
                    bytes_recv: 2000 * self.step,
                    packets_sent: 10 * self.step,
                    packets_recv: 20 * self.step,
                },
            )];
            if self.extra_interface_from.is_some_and(|from| self.step >= from) {
                counters.push((
                    "wg0".to_string(),
                    NetCounters {
                        bytes_sent: 7777 * self.step,
                        ..Default::default()
                    },
                ));
            }
            Ok(counters)
        }
    }

    #[test]
    fn test_parse_loadavg() {
        let load = parse_loadavg("0.52 0.58 0.59 1/389 12345\n").unwrap();
        assert_eq!(load.load1, 0.52);
        assert_eq!(load.load5, 0.58);
        assert_eq!(load.load15, 0.59);

        assert!(parse_loadavg("0.52").is_err());
        assert!(parse_loadavg("a b c").is_err());
    }

    #[test]
    fn test_first_sample_has_zero_deltas() {
        let mut sampler = SystemSampler::with_source(FakeSource::new(), SystemConfig::default());
        let stats = sampler.sample();

        assert_eq!(stats.cpu, Some(CpuPercent::default()));
        assert_eq!(stats.bandwidth.get("eth0"), Some(&BandwidthStats::default()));
    }

    #[test]
    fn test_second_sample_reports_deltas() {
        let mut sampler = SystemSampler::with_source(FakeSource::new(), SystemConfig::default());
        sampler.sample();
        let stats = sampler.sample();

        let cpu = stats.cpu.expect("cpu group");
        assert!((cpu.user - 10.0).abs() < 1e-9);
        assert!((cpu.system - 5.0).abs() < 1e-9);
        assert!((cpu.idle - 85.0).abs() < 1e-9);

        let eth0 = stats.bandwidth["eth0"];
        assert_eq!(eth0.bytes_sent, 1000);
        assert_eq!(eth0.bytes_recv, 2000);
        assert_eq!(eth0.packets_sent, 10);
        assert_eq!(eth0.packets_recv, 20);
    }

    #[test]
    fn test_failed_groups_are_omitted() {
        let mut source = FakeSource::new();
        source.fail_load = true;
        let mut sampler = SystemSampler::with_source(source, SystemConfig::default());

        let stats = sampler.sample();
        assert!(stats.load.is_none());
        assert!(stats.disks.is_empty());
        assert!(stats.memory.is_some());
        assert!(stats.cpu.is_some());
    }

    #[test]
    fn test_disabled_groups_are_skipped() {
        let config = SystemConfig::default().with_cpu(false).with_net(false);
        let mut sampler = SystemSampler::with_source(FakeSource::new(), config);

        let stats = sampler.sample();
        assert!(stats.cpu.is_none());
        assert!(stats.bandwidth.is_empty());
        assert_eq!(sampler.known_interfaces(), 0);
        assert_eq!(sampler.source_mut().step, 0);
    }

    #[test]
    fn test_new_interface_appears_without_spike() {
        let mut source = FakeSource::new();
        source.extra_interface_from = Some(3);
        let mut sampler = SystemSampler::with_source(source, SystemConfig::default());

        assert!(!sampler.sample().bandwidth.contains_key("wg0"));
        assert!(!sampler.sample().bandwidth.contains_key("wg0"));

        let third = sampler.sample();
        assert_eq!(third.bandwidth.get("wg0"), Some(&BandwidthStats::default()));

        let fourth = sampler.sample();
        assert_eq!(fourth.bandwidth["wg0"].bytes_sent, 7777);
        assert_eq!(sampler.known_interfaces(), 2);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_host_source_reads_proc() {
        let mut source = HostSource::new();
        assert!(source.cpu_times().unwrap().total() > 0);
        assert!(source.load_average().is_ok());
        source.refresh_memory();
        assert!(source.virtual_memory().unwrap().total > 0);
    }

    #[cfg(not(target_os = "linux"))]
    #[test]
    fn test_host_cpu_times_unavailable() {
        let mut source = HostSource::new();
        assert!(matches!(
            source.cpu_times(),
            Err(MetricsError::Unavailable(_))
        ));
    }

    #[test]
    fn test_memory_refreshed_once_per_cycle() {
        let mut sampler = SystemSampler::with_source(FakeSource::new(), SystemConfig::default());
        sampler.sample();
        sampler.sample();
        sampler.sample();
        assert_eq!(sampler.source_mut().memory_refreshes, 3);

        let config = SystemConfig::default().with_mem(false);
        let mut sampler = SystemSampler::with_source(FakeSource::new(), config);
        sampler.sample();
        assert_eq!(sampler.source_mut().memory_refreshes, 0);
    }
}
