//! Sampler configuration.

use serde::{Deserialize, Serialize};

/// Metric groups gathered by the system sampler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    pub enable_cpu: bool,
    pub enable_load: bool,
    pub enable_mem: bool,
    pub enable_disk: bool,
    pub enable_net: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            enable_cpu: true,
            enable_load: true,
            enable_mem: true,
            enable_disk: true,
            enable_net: true,
        }
    }
}

impl SystemConfig {
    /// Enable or disable CPU percentages.
    pub fn with_cpu(mut self, enable: bool) -> Self {
        self.enable_cpu = enable;
        self
    }

    /// Enable or disable load averages.
    pub fn with_load(mut self, enable: bool) -> Self {
        self.enable_load = enable;
        self
    }

    /// Enable or disable virtual memory and swap totals.
    pub fn with_mem(mut self, enable: bool) -> Self {
        self.enable_mem = enable;
        self
    }

    /// Enable or disable per-partition disk usage.
    pub fn with_disk(mut self, enable: bool) -> Self {
        self.enable_disk = enable;
        self
    }

    /// Enable or disable per-interface bandwidth.
    pub fn with_net(mut self, enable: bool) -> Self {
        self.enable_net = enable;
        self
    }
}

/// Metric groups gathered by the runtime sampler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// CPU count, threads, process CPU usage and async task counts.
    pub enable_cpu: bool,
    /// Process memory and allocation counters.
    pub enable_mem: bool,
    /// Deallocation counters. Only honoured when `enable_mem` is set.
    pub enable_free: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            enable_cpu: true,
            enable_mem: true,
            enable_free: true,
        }
    }
}

impl RuntimeConfig {
    pub fn with_cpu(mut self, enable: bool) -> Self {
        self.enable_cpu = enable;
        self
    }

    pub fn with_mem(mut self, enable: bool) -> Self {
        self.enable_mem = enable;
        self
    }

    pub fn with_free(mut self, enable: bool) -> Self {
        self.enable_free = enable;
        self
    }

    /// Whether deallocation counters will actually be collected.
    pub fn collects_free(&self) -> bool {
        self.enable_mem && self.enable_free
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_enable_everything() {
        let system = SystemConfig::default();
        assert!(system.enable_cpu && system.enable_load && system.enable_mem);
        assert!(system.enable_disk && system.enable_net);

        let runtime = RuntimeConfig::default();
        assert!(runtime.collects_free());
    }

    #[test]
    fn test_free_requires_mem() {
        let runtime = RuntimeConfig::default().with_mem(false);
        assert!(runtime.enable_free);
        assert!(!runtime.collects_free());
    }
}
