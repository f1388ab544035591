//! System monitor module initialization.

use loginwatch_core::config::LoginwatchConfig;
use loginwatch_system_monitor::{SysinfoSampler, SystemMonitor, SystemSettings};

use super::ModuleHandle;

/// Module name used in logs and health reports.
pub const NAME: &str = "system-monitor";

/// Initialize the host resource sampler from `[system]`.
pub fn init(config: &LoginwatchConfig) -> ModuleHandle {
    let settings = SystemSettings::from_core(&config.system);
    tracing::info!(
        interval_secs = config.system.interval_secs,
        disk_paths = ?settings.disk_paths,
        top_processes = settings.top_processes,
        "initializing system monitor"
    );

    let monitor = SystemMonitor::new(SysinfoSampler::new(&settings), settings.interval);
    ModuleHandle::new(NAME, Box::new(monitor))
}
