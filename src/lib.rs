//! # app_metrics - periodic process and host metrics
//!
//! Collects operating-system and process/runtime statistics on a fixed
//! interval and publishes them through pluggable sinks.
//!
//! ## Features
//!
//! - **Delta engine**: per-interval CPU percentages and network traffic from
//!   cumulative kernel counters
//! - **Collectors**: one tokio task per sampler, stopped by any future
//! - **Exported variables**: two shared maps (`runtimeStats`, `systemStats`)
//!   kept current in the background
//! - **Prometheus**: gauges updated in place, served on `/metrics`
//! - **Debug endpoint**: `/debug/stats/?seconds=N` renders a measured window
//!   as plain text
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use app_metrics::{Collector, Snapshot, SystemSampler};
//!
//! #[tokio::main]
//! async fn main() {
//!     let collector = Collector::new(SystemSampler::new())
//!         .with_interval(Duration::from_secs(1))
//!         .with_handler(|stats| println!("{:?}", stats.values()));
//!
//!     collector.run(tokio::time::sleep(Duration::from_secs(5))).await;
//! }
//! ```

use std::time::Duration;

pub mod error;
pub mod metrics;
pub mod publish;
pub mod web;

// Re-export public API
pub use error::{MetricsError, Result};
pub use metrics::{
    Collector, HostSource, RuntimeCollector, RuntimeConfig, RuntimeSampler, RuntimeStats,
    Sampler, Snapshot, SystemCollector, SystemConfig, SystemSampler, SystemSource, SystemStats,
    TrackingAllocator, Value, Values,
};
pub use publish::{shutdown_signal, ExportedVars, SystemRegistry};
pub use web::{create_app, start_web_server, AppState, WebConfig};

/// Collection interval used when none (or zero) is given.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Wait of `/debug/stats/` when `seconds` is missing or invalid.
pub const DEFAULT_STATS_SECONDS: u64 = 30;

/// Upper bound of the `/debug/stats/` wait.
pub const MAX_STATS_SECONDS: u64 = 300;

/// The default web server port
pub const DEFAULT_WEB_PORT: u16 = 8080;
