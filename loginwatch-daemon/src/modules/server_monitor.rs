//! Server monitor module initialization.
//!
//! Wraps a [`ServerMonitor`] in a `ModuleHandle` and hands out the
//! snapshot handle that the detector stamps onto every event.

use std::time::Duration;

use loginwatch_core::config::LoginwatchConfig;
use loginwatch_session_detector::{ServerInfoHandle, ServerInfoProvider, ServerMonitor};

use super::ModuleHandle;

/// Module name used in logs and health reports.
pub const NAME: &str = "server-monitor";

/// Initialize the server monitor with the given identity provider.
///
/// The returned handle reads `unknown` values until the module starts.
pub fn init<P: ServerInfoProvider>(
    config: &LoginwatchConfig,
    provider: P,
) -> (ModuleHandle, ServerInfoHandle) {
    let interval = Duration::from_secs(config.server.refresh_interval_secs);
    tracing::info!(
        refresh_interval_secs = config.server.refresh_interval_secs,
        "initializing server monitor"
    );

    let monitor = ServerMonitor::new(provider, interval);
    let handle = monitor.handle();
    (ModuleHandle::new(NAME, Box::new(monitor)), handle)
}
