//! Exported variables: named maps of numeric cells kept current by
//! long-lived collectors and readable from anywhere in the process.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::metrics::collector::Collector;
use crate::metrics::data::{RuntimeStats, SystemStats, Value, Values};
use crate::metrics::runtime::RuntimeSampler;
use crate::metrics::system::SystemSampler;
use crate::metrics::traits::{Snapshot, SystemSource};
use crate::publish::shutdown_signal;

/// Name of the map holding process and runtime metrics.
pub const RUNTIME_MAP: &str = "runtimeStats";

/// Name of the map holding operating-system metrics.
pub const SYSTEM_MAP: &str = "systemStats";

/// A single exported cell. Floats are stored as their bit pattern.
#[derive(Debug)]
pub enum Var {
    Int(AtomicU64),
    Float(AtomicU64),
}

impl Var {
    fn new(value: Value) -> Self {
        match value {
            Value::Int(v) => Var::Int(AtomicU64::new(v)),
            Value::Float(v) => Var::Float(AtomicU64::new(v.to_bits())),
        }
    }

    /// Store `value` if it has the same kind as the cell.
    fn store(&self, value: Value) -> bool {
        match (self, value) {
            (Var::Int(cell), Value::Int(v)) => cell.store(v, Ordering::Relaxed),
            (Var::Float(cell), Value::Float(v)) => cell.store(v.to_bits(), Ordering::Relaxed),
            _ => return false,
        }
        true
    }

    /// Current value of the cell.
    pub fn load(&self) -> Value {
        match self {
            Var::Int(cell) => Value::Int(cell.load(Ordering::Relaxed)),
            Var::Float(cell) => Value::Float(f64::from_bits(cell.load(Ordering::Relaxed))),
        }
    }
}

/// A named map of exported cells.
///
/// Cells are created the first time a key is set and are never removed, so
/// keys for devices that disappear keep their last value.
#[derive(Debug)]
pub struct VarMap {
    name: String,
    vars: DashMap<String, Var>,
}

impl VarMap {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vars: DashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.vars.get(key).map(|entry| entry.value().load())
    }

    /// Set `key`, creating the cell on first use.
    pub fn set(&self, key: &str, value: Value) {
        if let Some(var) = self.vars.get(key) {
            if var.store(value) {
                return;
            }
        }
        self.vars.insert(key.to_string(), Var::new(value));
    }

    /// Set every key of a snapshot.
    pub fn update(&self, values: &Values) {
        for (key, value) in values {
            self.set(key, *value);
        }
    }

    /// Copy of all cells, sorted by key.
    pub fn snapshot(&self) -> Values {
        self.vars
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().load()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// The two exported maps, one for runtime and one for system metrics.
///
/// Cloning is cheap and every clone shares the same maps.
#[derive(Debug, Clone)]
pub struct ExportedVars {
    runtime: Arc<VarMap>,
    system: Arc<VarMap>,
}

impl Default for ExportedVars {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportedVars {
    pub fn new() -> Self {
        Self {
            runtime: Arc::new(VarMap::new(RUNTIME_MAP)),
            system: Arc::new(VarMap::new(SYSTEM_MAP)),
        }
    }

    pub fn runtime(&self) -> &VarMap {
        &self.runtime
    }

    pub fn system(&self) -> &VarMap {
        &self.system
    }

    /// Collector handler that copies runtime snapshots into the runtime map.
    pub fn runtime_handler(&self) -> impl FnMut(RuntimeStats) + Send + 'static {
        let map = self.runtime.clone();
        move |stats| map.update(&stats.values())
    }

    /// Collector handler that copies system snapshots into the system map.
    pub fn system_handler(&self) -> impl FnMut(SystemStats) + Send + 'static {
        let map = self.system.clone();
        move |stats| map.update(&stats.values())
    }

    /// Start one collector per map, both stopping when `shutdown` flips to
    /// `true` or its sender is dropped.
    pub fn spawn<S>(
        &self,
        runtime: RuntimeSampler,
        system: SystemSampler<S>,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Vec<JoinHandle<()>>
    where
        S: SystemSource + 'static,
    {
        info!(interval_ms = interval.as_millis() as u64, "publishing exported variables");

        let runtime = Collector::new(runtime)
            .with_interval(interval)
            .with_handler(self.runtime_handler())
            .spawn(shutdown_signal(shutdown.clone()));

        let system = Collector::new(system)
            .with_interval(interval)
            .with_handler(self.system_handler())
            .spawn(shutdown_signal(shutdown));

        vec![runtime, system]
    }

    /// Both maps as one JSON object keyed by map name.
    pub fn to_json(&self) -> serde_json::Value {
        let mut root = serde_json::Map::new();
        for map in [&self.runtime, &self.system] {
            let cells = map
                .snapshot()
                .into_iter()
                .map(|(key, value)| (key, serde_json::json!(value)))
                .collect();
            root.insert(map.name().to_string(), serde_json::Value::Object(cells));
        }
        serde_json::Value::Object(root)
    }
}
