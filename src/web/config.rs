//! Web server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the web server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Host to bind the server to
    pub host: String,
    /// Port to bind the server to
    pub port: u16,
    /// Wait used by `/debug/stats/` when `seconds` is missing or invalid
    pub default_stats_seconds: u64,
    /// Upper bound for the `seconds` query parameter
    pub max_stats_seconds: u64,
    /// Interval of the long-lived collectors, in milliseconds
    pub collect_interval_ms: u64,
    /// Whether to run the Prometheus registry collector and serve `/metrics`
    pub enable_registry: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: crate::DEFAULT_WEB_PORT,
            default_stats_seconds: crate::DEFAULT_STATS_SECONDS,
            max_stats_seconds: crate::MAX_STATS_SECONDS,
            collect_interval_ms: crate::DEFAULT_INTERVAL.as_millis() as u64,
            enable_registry: true,
        }
    }
}

impl WebConfig {
    /// Create a new web configuration with custom host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the `/debug/stats/` default wait. Zero keeps the built-in default.
    pub fn with_default_stats_seconds(mut self, seconds: u64) -> Self {
        if seconds > 0 {
            self.default_stats_seconds = seconds;
        }
        self
    }

    /// Set the `/debug/stats/` maximum wait. Zero keeps the built-in maximum.
    pub fn with_max_stats_seconds(mut self, seconds: u64) -> Self {
        if seconds > 0 {
            self.max_stats_seconds = seconds;
        }
        self
    }

    pub fn with_collect_interval(mut self, interval: Duration) -> Self {
        self.collect_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_registry(mut self, enable: bool) -> Self {
        self.enable_registry = enable;
        self
    }

    /// Interval of the long-lived collectors. Zero selects the default.
    pub fn collect_interval(&self) -> Duration {
        if self.collect_interval_ms == 0 {
            crate::DEFAULT_INTERVAL
        } else {
            Duration::from_millis(self.collect_interval_ms)
        }
    }

    /// Get the full bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WebConfig::default();
        assert_eq!(config.port, crate::DEFAULT_WEB_PORT);
        assert_eq!(config.default_stats_seconds, 30);
        assert_eq!(config.max_stats_seconds, 300);
        assert_eq!(config.collect_interval(), crate::DEFAULT_INTERVAL);
        assert!(config.enable_registry);
    }

    #[test]
    fn test_builders() {
        let config = WebConfig::new("127.0.0.1", 9000)
            .with_default_stats_seconds(5)
            .with_max_stats_seconds(0)
            .with_collect_interval(Duration::from_millis(250))
            .with_registry(false);

        assert_eq!(config.bind_address(), "127.0.0.1:9000");
        assert_eq!(config.default_stats_seconds, 5);
        assert_eq!(config.max_stats_seconds, crate::MAX_STATS_SECONDS);
        assert_eq!(config.collect_interval(), Duration::from_millis(250));
        assert!(!config.enable_registry);
    }

    #[test]
    fn test_zero_interval_uses_default() {
        let config = WebConfig::default().with_collect_interval(Duration::ZERO);
        assert_eq!(config.collect_interval(), crate::DEFAULT_INTERVAL);
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = WebConfig::new("localhost", 1234);
        let json = serde_json::to_string(&config).unwrap();
        let back: WebConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.bind_address(), "localhost:1234");
    }
}
