//! Notifier manager module initialization.
//!
//! # Channel Wiring
//!
//! ```text
//! session-detector --SessionEvent--> EventBus --> NotifyManager --> notifiers
//! ```

use loginwatch_core::SessionEventBus;
use loginwatch_core::config::LoginwatchConfig;
use loginwatch_notify::NotifyManager;

use super::ModuleHandle;

/// Module name used in logs and health reports.
pub const NAME: &str = "notify";

/// Initialize the notifier manager.
///
/// Back-ends that fail to build are skipped. With none left the manager
/// runs in log-only mode.
pub fn init(config: &LoginwatchConfig, bus: SessionEventBus) -> ModuleHandle {
    let manager = NotifyManager::from_config(bus, &config.notify);
    tracing::info!(
        configured = config.notify.enabled_count(),
        built = ?manager.notifier_names(),
        "initializing notifier manager"
    );

    ModuleHandle::new(NAME, Box::new(manager))
}
