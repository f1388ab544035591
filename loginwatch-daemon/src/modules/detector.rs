//! Session detector module initialization.
//!
//! Converts `LoginwatchConfig.detector` into `DetectorSettings`, builds the
//! `SessionDetector` on the shared bus, and wraps it in a `ModuleHandle`.

use anyhow::Result;
use tokio::sync::watch;

use loginwatch_core::SessionEventBus;
use loginwatch_core::config::LoginwatchConfig;
use loginwatch_session_detector::{
    DetectorSettings, DetectorState, ServerInfoHandle, SessionDetectorBuilder,
};

use super::ModuleHandle;

/// Module name used in logs and health reports.
pub const NAME: &str = "session-detector";

/// Initialize the session detector.
///
/// Also returns a receiver for detector state changes so the orchestrator
/// can notice the read loop exiting on its own.
pub fn init(
    config: &LoginwatchConfig,
    bus: SessionEventBus,
    server: ServerInfoHandle,
) -> Result<(ModuleHandle, watch::Receiver<DetectorState>)> {
    tracing::info!("initializing session detector");

    let settings = DetectorSettings::from_core(&config.detector);
    let (detector, _) = SessionDetectorBuilder::new()
        .settings(settings)
        .bus(bus)
        .server_info(server)
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build session detector: {}", e))?;

    let state = detector.status_watch();
    Ok((ModuleHandle::new(NAME, Box::new(detector)), state))
}
