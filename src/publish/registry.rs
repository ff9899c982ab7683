//! Prometheus registry publisher.
//!
//! Instead of handing snapshots to a callback, [`SystemRegistry`] keeps a set
//! of gauges and overwrites them in place on every cycle. Gauges for
//! partitions and interfaces are created the first time the device is seen
//! and are never unregistered.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use prometheus::{
    Encoder, Gauge, GaugeVec, Histogram, HistogramOpts, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use tracing::debug;

use crate::error::{MetricsError, Result};
use crate::metrics::collector::run_ticker;
use crate::metrics::config::SystemConfig;
use crate::metrics::data::SystemStats;
use crate::metrics::system::{HostSource, SystemSampler};
use crate::metrics::traits::{Sampler, SystemSource};

/// Gauges never go above `i64::MAX`; larger counters are clamped.
fn gauge_value(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

struct CpuGauges {
    user: Gauge,
    system: Gauge,
    nice: Gauge,
    iowait: Gauge,
    irq: Gauge,
    softirq: Gauge,
    steal: Gauge,
    idle: Gauge,
}

struct DiskGauges {
    total: IntGauge,
    free: IntGauge,
}

struct BandwidthGauges {
    bytes_sent: IntGauge,
    bytes_recv: IntGauge,
    packets_sent: IntGauge,
    packets_recv: IntGauge,
}

/// OS metrics published as Prometheus gauges.
pub struct SystemRegistry<S = HostSource> {
    registry: Registry,
    sampler: SystemSampler<S>,

    cpu: CpuGauges,
    load1: Gauge,
    load5: Gauge,
    load15: Gauge,
    mem_total: IntGauge,
    mem_available: IntGauge,
    mem_used: IntGauge,
    swap_total: IntGauge,
    swap_free: IntGauge,
    swap_used: IntGauge,

    disk_total: IntGaugeVec,
    disk_free: IntGaugeVec,
    net_bytes_sent: IntGaugeVec,
    net_bytes_recv: IntGaugeVec,
    net_packets_sent: IntGaugeVec,
    net_packets_recv: IntGaugeVec,
    disks: HashMap<String, DiskGauges>,
    interfaces: HashMap<String, BandwidthGauges>,

    capture_seconds: Histogram,
}

impl SystemRegistry<HostSource> {
    /// Register gauges for the local host in `registry`.
    pub fn new(registry: Registry) -> Result<Self> {
        Self::with_sampler(registry, SystemSampler::with_config(SystemConfig::default()))
    }
}

impl<S: SystemSource> SystemRegistry<S> {
    pub fn with_sampler(registry: Registry, sampler: SystemSampler<S>) -> Result<Self> {
        let cpu_percent = GaugeVec::new(
            Opts::new("system_cpu_percent", "Share of CPU time per mode over the last interval"),
            &["mode"],
        )?;
        let cpu = CpuGauges {
            user: cpu_percent.with_label_values(&["user"]),
            system: cpu_percent.with_label_values(&["system"]),
            nice: cpu_percent.with_label_values(&["nice"]),
            iowait: cpu_percent.with_label_values(&["iowait"]),
            irq: cpu_percent.with_label_values(&["irq"]),
            softirq: cpu_percent.with_label_values(&["softirq"]),
            steal: cpu_percent.with_label_values(&["steal"]),
            idle: cpu_percent.with_label_values(&["idle"]),
        };

        let load1 = Gauge::new("system_load1", "1 minute load average")?;
        let load5 = Gauge::new("system_load5", "5 minute load average")?;
        let load15 = Gauge::new("system_load15", "15 minute load average")?;

        let mem_total = IntGauge::new("system_memory_total_bytes", "Total memory")?;
        let mem_available = IntGauge::new("system_memory_available_bytes", "Available memory")?;
        let mem_used = IntGauge::new("system_memory_used_bytes", "Used memory")?;
        let swap_total = IntGauge::new("system_swap_total_bytes", "Total swap")?;
        let swap_free = IntGauge::new("system_swap_free_bytes", "Free swap")?;
        let swap_used = IntGauge::new("system_swap_used_bytes", "Used swap")?;

        let disk_total = IntGaugeVec::new(
            Opts::new("system_disk_total_bytes", "Partition size"),
            &["mountpoint"],
        )?;
        let disk_free = IntGaugeVec::new(
            Opts::new("system_disk_free_bytes", "Partition space available"),
            &["mountpoint"],
        )?;

        let net_bytes_sent = IntGaugeVec::new(
            Opts::new("system_net_bytes_sent", "Bytes sent over the last interval"),
            &["interface"],
        )?;
        let net_bytes_recv = IntGaugeVec::new(
            Opts::new("system_net_bytes_recv", "Bytes received over the last interval"),
            &["interface"],
        )?;
        let net_packets_sent = IntGaugeVec::new(
            Opts::new("system_net_packets_sent", "Packets sent over the last interval"),
            &["interface"],
        )?;
        let net_packets_recv = IntGaugeVec::new(
            Opts::new("system_net_packets_recv", "Packets received over the last interval"),
            &["interface"],
        )?;

        let capture_seconds = Histogram::with_opts(HistogramOpts::new(
            "system_capture_seconds",
            "Time spent sampling and publishing system metrics",
        ))?;

        registry.register(Box::new(cpu_percent))?;
        registry.register(Box::new(load1.clone()))?;
        registry.register(Box::new(load5.clone()))?;
        registry.register(Box::new(load15.clone()))?;
        registry.register(Box::new(mem_total.clone()))?;
        registry.register(Box::new(mem_available.clone()))?;
        registry.register(Box::new(mem_used.clone()))?;
        registry.register(Box::new(swap_total.clone()))?;
        registry.register(Box::new(swap_free.clone()))?;
        registry.register(Box::new(swap_used.clone()))?;
        registry.register(Box::new(disk_total.clone()))?;
        registry.register(Box::new(disk_free.clone()))?;
        registry.register(Box::new(net_bytes_sent.clone()))?;
        registry.register(Box::new(net_bytes_recv.clone()))?;
        registry.register(Box::new(net_packets_sent.clone()))?;
        registry.register(Box::new(net_packets_recv.clone()))?;
        registry.register(Box::new(capture_seconds.clone()))?;

        Ok(Self {
            registry,
            sampler,
            cpu,
            load1,
            load5,
            load15,
            mem_total,
            mem_available,
            mem_used,
            swap_total,
            swap_free,
            swap_used,
            disk_total,
            disk_free,
            net_bytes_sent,
            net_bytes_recv,
            net_packets_sent,
            net_packets_recv,
            disks: HashMap::new(),
            interfaces: HashMap::new(),
            capture_seconds,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Interfaces that have gauges, in no particular order.
    pub fn interfaces(&self) -> impl Iterator<Item = &str> {
        self.interfaces.keys().map(String::as_str)
    }

    /// Partitions that have gauges, in no particular order.
    pub fn partitions(&self) -> impl Iterator<Item = &str> {
        self.disks.keys().map(String::as_str)
    }

    /// Sample once and overwrite the gauges.
    pub fn capture_once(&mut self) {
        let timer = self.capture_seconds.start_timer();
        let stats = self.sampler.sample();
        self.publish(&stats);
        timer.observe_duration();
    }

    /// Capture immediately, then every `interval` until `shutdown` completes.
    pub async fn run<F>(mut self, interval: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let interval = if interval.is_zero() {
            crate::DEFAULT_INTERVAL
        } else {
            interval
        };
        run_ticker(interval, shutdown, || self.capture_once()).await;
    }

    fn publish(&mut self, stats: &SystemStats) {
        if let Some(cpu) = &stats.cpu {
            self.cpu.user.set(cpu.user);
            self.cpu.system.set(cpu.system);
            self.cpu.nice.set(cpu.nice);
            self.cpu.iowait.set(cpu.iowait);
            self.cpu.irq.set(cpu.irq);
            self.cpu.softirq.set(cpu.softirq);
            self.cpu.steal.set(cpu.steal);
            self.cpu.idle.set(cpu.idle);
        }

        if let Some(load) = &stats.load {
            self.load1.set(load.load1);
            self.load5.set(load.load5);
            self.load15.set(load.load15);
        }

        if let Some(mem) = &stats.memory {
            self.mem_total.set(gauge_value(mem.total));
            self.mem_available.set(gauge_value(mem.available));
            self.mem_used.set(gauge_value(mem.used));
        }

        if let Some(swap) = &stats.swap {
            self.swap_total.set(gauge_value(swap.total));
            self.swap_free.set(gauge_value(swap.free));
            self.swap_used.set(gauge_value(swap.used));
        }

        for (mount, usage) in &stats.disks {
            let gauges = self.disks.entry(mount.clone()).or_insert_with(|| {
                debug!(mountpoint = %mount, "registering partition gauges");
                DiskGauges {
                    total: self.disk_total.with_label_values(&[mount.as_str()]),
                    free: self.disk_free.with_label_values(&[mount.as_str()]),
                }
            });
            gauges.total.set(gauge_value(usage.total));
            gauges.free.set(gauge_value(usage.free));
        }

        for (name, traffic) in &stats.bandwidth {
            let gauges = self.interfaces.entry(name.clone()).or_insert_with(|| {
                debug!(interface = %name, "registering interface gauges");
                BandwidthGauges {
                    bytes_sent: self.net_bytes_sent.with_label_values(&[name.as_str()]),
                    bytes_recv: self.net_bytes_recv.with_label_values(&[name.as_str()]),
                    packets_sent: self.net_packets_sent.with_label_values(&[name.as_str()]),
                    packets_recv: self.net_packets_recv.with_label_values(&[name.as_str()]),
                }
            });
            gauges.bytes_sent.set(gauge_value(traffic.bytes_sent));
            gauges.bytes_recv.set(gauge_value(traffic.bytes_recv));
            gauges.packets_sent.set(gauge_value(traffic.packets_sent));
            gauges.packets_recv.set(gauge_value(traffic.packets_recv));
        }
    }
}

/// Render every metric family of `registry` in the Prometheus text format.
pub fn encode_text(registry: &Registry) -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| MetricsError::parse_error(format!("encoded metrics: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::data::{DiskStats, LoadStats, MemStats, SwapStats};
    use crate::metrics::delta::{CpuTimes, NetCounters};

    /// Reports one interface, then a second one from the third call on.
    struct HotplugSource {
        calls: u64,
    }

    impl SystemSource for HotplugSource {
        fn cpu_times(&mut self) -> Result<CpuTimes> {
            Ok(CpuTimes {
                user: 10 * (self.calls + 1),
                idle: 90 * (self.calls + 1),
                ..Default::default()
            })
        }

        fn load_average(&mut self) -> Result<LoadStats> {
            Ok(LoadStats {
                load1: 2.0,
                load5: 1.0,
                load15: 0.5,
            })
        }

        fn virtual_memory(&mut self) -> Result<MemStats> {
            Ok(MemStats {
                total: 2048,
                available: 1024,
                used: 1024,
            })
        }

        fn swap_memory(&mut self) -> Result<SwapStats> {
            Ok(SwapStats::default())
        }

        fn disk_usage(&mut self) -> Result<Vec<(String, DiskStats)>> {
            Ok(vec![(
                "/".to_string(),
                DiskStats {
                    total: 100,
                    free: 25,
                },
            )])
        }

        fn net_counters(&mut self) -> Result<Vec<(String, NetCounters)>> {
            self.calls += 1;
            let mut counters = vec![(
                "eth0".to_string(),
                NetCounters {
                    bytes_sent: 100 * self.calls,
                    bytes_recv: 200 * self.calls,
                    packets_sent: 3 * self.calls,
                    packets_recv: 4 * self.calls,
                },
            )];
            if self.calls >= 3 {
                counters.push(("wlan0".to_string(), NetCounters::default()));
            }
            Ok(counters)
        }
    }

    fn registry() -> SystemRegistry<HotplugSource> {
        let sampler = SystemSampler::with_source(HotplugSource { calls: 0 }, SystemConfig::default());
        SystemRegistry::with_sampler(Registry::new(), sampler).unwrap()
    }

    #[test]
    fn test_capture_sets_gauges() {
        let mut reg = registry();
        reg.capture_once();
        reg.capture_once();

        assert_eq!(reg.load1.get(), 2.0);
        assert_eq!(reg.mem_total.get(), 2048);
        assert_eq!(reg.cpu.user.get(), 10.0);

        let eth0 = &reg.interfaces["eth0"];
        assert_eq!(eth0.bytes_sent.get(), 100);
        assert_eq!(eth0.bytes_recv.get(), 200);
        assert_eq!(eth0.packets_sent.get(), 3);
        assert_eq!(eth0.packets_recv.get(), 4);
        assert_eq!(reg.partitions().collect::<Vec<_>>(), vec!["/"]);
        assert_eq!(reg.capture_seconds.get_sample_count(), 2);
    }

    #[test]
    fn test_interface_registered_lazily() {
        let mut reg = registry();
        reg.capture_once();
        reg.capture_once();
        assert_eq!(reg.interfaces().count(), 1);

        reg.capture_once();
        let mut names: Vec<_> = reg.interfaces().collect();
        names.sort();
        assert_eq!(names, vec!["eth0", "wlan0"]);
    }

    #[test]
    fn test_interface_counters_are_distinct_metrics() {
        let mut reg = registry();
        reg.capture_once();
        reg.capture_once();

        let text = encode_text(reg.registry()).unwrap();
        assert!(text.contains("system_net_bytes_sent{interface=\"eth0\"} 100"));
        assert!(text.contains("system_net_bytes_recv{interface=\"eth0\"} 200"));
        assert!(text.contains("system_net_packets_sent{interface=\"eth0\"} 3"));
        assert!(text.contains("system_net_packets_recv{interface=\"eth0\"} 4"));
        assert!(text.contains("system_cpu_percent{mode=\"idle\"}"));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let shared = Registry::new();
        let first = SystemSampler::with_source(HotplugSource { calls: 0 }, SystemConfig::default());
        let second = SystemSampler::with_source(HotplugSource { calls: 0 }, SystemConfig::default());

        assert!(SystemRegistry::with_sampler(shared.clone(), first).is_ok());
        assert!(matches!(
            SystemRegistry::with_sampler(shared, second),
            Err(MetricsError::Registry(_))
        ));
    }

    #[test]
    fn test_gauge_value_clamps() {
        assert_eq!(gauge_value(5), 5);
        assert_eq!(gauge_value(u64::MAX), i64::MAX);
    }
}
