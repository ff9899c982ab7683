//! Publishers that make collected metrics readable by other parts of the
//! process or by external monitoring backends.
//!
//! - [`vars`]: two named maps of exported numeric cells, updated by
//!   long-lived collectors.
//! - [`registry`]: Prometheus gauges updated in place on every cycle.

pub mod registry;
pub mod vars;

pub use registry::{encode_text, SystemRegistry};
pub use vars::{ExportedVars, Var, VarMap, RUNTIME_MAP, SYSTEM_MAP};

use tokio::sync::watch;

/// Resolves once `shutdown` holds `true` or its sender is dropped.
///
/// Each long-lived collector gets its own receiver clone, so one watch
/// channel stops all of them.
pub async fn shutdown_signal(mut shutdown: watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
