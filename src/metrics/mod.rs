//! Metrics sampling, delta computation and collection.
//!
//! This module holds the core of the crate: samplers that read the operating
//! system and the current process, the delta engine that turns cumulative
//! counters into per-interval values, and the [`Collector`] that drives a
//! sampler on a fixed cadence.

pub mod alloc;
pub mod collector;
pub mod config;
pub mod data;
pub mod delta;
pub mod runtime;
pub mod system;
pub mod traits;

// Re-export commonly used items
pub use alloc::TrackingAllocator;
pub use collector::{Collector, RuntimeCollector, StatsHandler, SystemCollector};
pub use config::{RuntimeConfig, SystemConfig};
pub use data::{RuntimeStats, SystemStats, Value, Values};
pub use runtime::RuntimeSampler;
pub use system::{HostSource, SystemSampler};
pub use traits::{Sampler, Snapshot, SystemSource};
