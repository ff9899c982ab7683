//! HTTP surface for the collected metrics.
//!
//! The router serves plain-text debug stats, the exported-variable maps as
//! JSON, the Prometheus registry and a health check. [`start_web_server`]
//! also starts the long-lived collectors that keep the maps and the registry
//! current.

pub mod config;
pub mod handlers;
pub mod router;

pub use config::WebConfig;
pub use router::create_app;

use std::net::SocketAddr;
use std::sync::Arc;

use prometheus::Registry;
use tokio::sync::watch;
use tracing::{error, info};

use crate::error::{MetricsError, Result};
use crate::metrics::alloc::TrackingAllocator;
use crate::metrics::runtime::RuntimeSampler;
use crate::metrics::system::SystemSampler;
use crate::publish::registry::SystemRegistry;
use crate::publish::shutdown_signal;
use crate::publish::vars::ExportedVars;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<WebConfig>,
    pub vars: ExportedVars,
    pub registry: Registry,
    pub allocator: Option<&'static TrackingAllocator>,
}

impl AppState {
    pub fn new(config: WebConfig) -> Self {
        Self {
            config: Arc::new(config),
            vars: ExportedVars::new(),
            registry: Registry::new(),
            allocator: None,
        }
    }

    /// Report allocator counters from `allocator`, which should be the
    /// process's global allocator.
    pub fn with_allocator(mut self, allocator: &'static TrackingAllocator) -> Self {
        self.allocator = Some(allocator);
        self
    }

    pub fn with_vars(mut self, vars: ExportedVars) -> Self {
        self.vars = vars;
        self
    }

    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    /// A fresh runtime sampler, reading allocator counters when one is set.
    pub fn runtime_sampler(&self) -> RuntimeSampler {
        match self.allocator {
            Some(allocator) => RuntimeSampler::new().with_allocator(allocator),
            None => RuntimeSampler::new(),
        }
    }
}

/// Start the background collectors and serve HTTP until `shutdown` flips to
/// `true`. Collectors are awaited before returning.
///
/// Nothing is registered or spawned until the listener is bound, so a failed
/// start leaves `state` untouched and can be retried.
pub async fn start_web_server(state: AppState, shutdown: watch::Receiver<bool>) -> Result<()> {
    let config = state.config.clone();
    let interval = config.collect_interval();

    let addr = config
        .bind_address()
        .parse::<SocketAddr>()
        .map_err(|e| MetricsError::config_error(format!("Invalid bind address: {}", e)))?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| MetricsError::web_server_error(format!("Failed to bind to address: {}", e)))?;

    let registry = if config.enable_registry {
        Some(SystemRegistry::new(state.registry.clone())?)
    } else {
        None
    };

    let mut tasks = state.vars.spawn(
        state.runtime_sampler(),
        SystemSampler::new(),
        interval,
        shutdown.clone(),
    );
    if let Some(registry) = registry {
        tasks.push(tokio::spawn(
            registry.run(interval, shutdown_signal(shutdown.clone())),
        ));
    }

    info!("Serving metrics on http://{}", addr);
    info!("Debug stats: http://{}/debug/stats/?seconds=N", addr);
    info!("Exported variables: http://{}/debug/vars", addr);
    if config.enable_registry {
        info!("Prometheus metrics: http://{}/metrics", addr);
    }

    let served = axum::serve(listener, create_app(state))
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .map_err(|e| MetricsError::web_server_error(format!("Server error: {}", e)));

    for task in tasks {
        if let Err(e) = task.await {
            error!("Collector task failed: {}", e);
        }
    }

    info!("Web server stopped");
    served
}
