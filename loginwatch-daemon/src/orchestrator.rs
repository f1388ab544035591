//! Module orchestration -- assembly, bus wiring, and lifecycle management.
//!
//! The [`Orchestrator`] is the central coordinator of `loginwatch-daemon`.
//! It owns the shared event bus, builds every module, manages
//! startup/shutdown ordering, and runs the main loop.
//!
//! # Startup Order
//!
//! 1. Server Monitor (resolves host identity; failure is fatal)
//! 2. Notifier Manager (subscribes to the bus before anything is published)
//! 3. Session Detector (starts tailing and publishing)
//!
//! # Shutdown Order (reverse)
//!
//! 1. Session Detector (stop producing events)
//! 2. Notifier Manager (drain in-flight deliveries)
//! 3. Server Monitor

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Result;
use tokio::sync::watch;

use loginwatch_core::SessionEventBus;
use loginwatch_core::config::LoginwatchConfig;
use loginwatch_core::error::{ConfigError, LoginwatchError};
use loginwatch_session_detector::{
    DetectorState, ServerInfoHandle, ServerInfoProvider, SystemServerInfo,
};

use crate::cli::DaemonCli;
use crate::health::{DaemonHealth, ModuleHealth, aggregate_status};
use crate::heartbeat::Heartbeat;
use crate::metrics_server;
use crate::modules::{self, ModuleRegistry};

/// Why the main loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// An OS signal (or the test harness) requested shutdown.
    Signal(&'static str),
    /// The detector's read loop exited on its own.
    DetectorExited(String),
}

impl ShutdownReason {
    /// Whether the daemon should exit with a failure status.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::DetectorExited(_))
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal(name) => write!(f, "signal {name}"),
            Self::DetectorExited(reason) => write!(f, "detector exited: {reason}"),
        }
    }
}

/// Load configuration for the daemon.
///
/// Order: file -> environment overrides -> CLI overrides -> validation.
/// A missing file at the default path falls back to built-in defaults;
/// a missing file at an explicit path is an error.
pub async fn load_config(cli: &DaemonCli) -> Result<LoginwatchConfig> {
    let mut config = match LoginwatchConfig::from_file(&cli.config).await {
        Ok(config) => config,
        Err(LoginwatchError::Config(ConfigError::FileNotFound { .. }))
            if cli.uses_default_config() =>
        {
            LoginwatchConfig::default()
        }
        Err(e) => return Err(anyhow::anyhow!("failed to load config: {}", e)),
    };

    config.apply_env_overrides();
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    Ok(config)
}

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: LoginwatchConfig,
    /// Shared event bus (detector publishes, notifier manager consumes).
    bus: SessionEventBus,
    /// Registered modules in start order.
    modules: ModuleRegistry,
    /// Latest server identity snapshot.
    server: ServerInfoHandle,
    /// Detector state changes, watched for an unexpected exit.
    detector_state: watch::Receiver<DetectorState>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Build from a validated configuration using the host's real identity.
    ///
    /// Installs the Prometheus recorder when `[metrics]` is enabled.
    pub fn build_from_config(config: LoginwatchConfig) -> Result<Self> {
        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }
        Self::build_with_provider(config, SystemServerInfo::default())
    }

    /// Build with a custom server identity provider.
    ///
    /// Does not touch the global metrics recorder.
    pub fn build_with_provider<P: ServerInfoProvider>(
        config: LoginwatchConfig,
        provider: P,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        tracing::debug!(
            capacity = config.detector.bus_capacity,
            "creating session event bus"
        );
        let bus = SessionEventBus::new(config.detector.bus_capacity);

        let mut registry = ModuleRegistry::new();

        let (monitor, server) = modules::server_monitor::init(&config, provider);
        registry.register(monitor);

        registry.register(modules::notify::init(&config, bus.clone()));

        let (detector, detector_state) =
            modules::detector::init(&config, bus.clone(), server.clone())?;
        registry.register(detector);

        if config.system.enabled {
            registry.register(modules::system_monitor::init(&config));
        }

        tracing::info!(modules = ?registry.names(), "orchestrator initialized");

        Ok(Self {
            config,
            bus,
            modules: registry,
            server,
            detector_state,
            start_time: Instant::now(),
        })
    }

    /// Start all modules and run until SIGTERM/SIGINT or a detector exit.
    pub async fn run(&mut self) -> Result<ShutdownReason> {
        let shutdown = shutdown_signal()?;
        self.run_until(shutdown).await
    }

    /// Start all modules and run until `shutdown` resolves or the detector
    /// exits on its own, then stop everything in reverse order.
    ///
    /// The PID file (if configured) exists exactly while modules run.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<ShutdownReason>
    where
        F: Future<Output = &'static str>,
    {
        let pid_path = self.pid_file();
        let pid_file = pid_path.as_deref();
        if let Some(path) = pid_file {
            write_pid_file(path)?;
        }

        tracing::info!("starting all modules");
        if let Err(e) = self.modules.start_all().await {
            tracing::warn!("startup failed, rolling back already-started modules");
            if let Err(stop_err) = self.modules.stop_all().await {
                tracing::error!(
                    startup_error = %e,
                    rollback_error = %stop_err,
                    "rollback also failed during startup failure cleanup"
                );
            }
            if let Some(path) = pid_file {
                remove_pid_file(path);
            }
            return Err(e);
        }

        let server = self.server.current();
        tracing::info!(
            hostname = %server.hostname,
            ip = %server.ip,
            os = %server.os_type,
            "loginwatch running"
        );

        let reason = self.main_loop(shutdown).await;
        match &reason {
            ShutdownReason::Signal(name) => {
                tracing::info!(signal = name, "shutdown signal received");
            }
            ShutdownReason::DetectorExited(cause) => {
                tracing::error!(reason = %cause, "session detector exited, shutting down");
            }
        }

        let stopped = self.shutdown().await;

        if let Some(path) = pid_file {
            remove_pid_file(path);
        }

        stopped.map(|()| reason)
    }

    async fn main_loop<F>(&self, shutdown: F) -> ShutdownReason
    where
        F: Future<Output = &'static str>,
    {
        let mut heartbeat = Heartbeat::new(&self.config.heartbeat, self.start_time);
        let mut detector_state = self.detector_state.clone();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                name = &mut shutdown => return ShutdownReason::Signal(name),
                changed = detector_state.changed() => {
                    if changed.is_err() {
                        return ShutdownReason::DetectorExited("state channel closed".to_owned());
                    }
                    let state = detector_state.borrow_and_update().clone();
                    if let DetectorState::Exited(cause) = state {
                        return ShutdownReason::DetectorExited(cause);
                    }
                }
                uptime = heartbeat.tick() => {
                    let health = self.health().await;
                    heartbeat.record(uptime, &health.status);
                }
            }
        }
    }

    /// Stop all modules in reverse start order.
    async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("stopping all modules");
        self.modules.stop_all().await
    }

    /// Get the current aggregated health status.
    pub async fn health(&self) -> DaemonHealth {
        let modules: Vec<ModuleHealth> = self
            .modules
            .health_statuses()
            .await
            .into_iter()
            .map(|(name, status)| ModuleHealth { name, status })
            .collect();

        DaemonHealth {
            status: aggregate_status(&modules),
            uptime_secs: self.start_time.elapsed().as_secs(),
            modules,
        }
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &LoginwatchConfig {
        &self.config
    }

    /// Shared session event bus.
    pub fn bus(&self) -> &SessionEventBus {
        &self.bus
    }

    /// Server identity handle.
    pub fn server_info(&self) -> &ServerInfoHandle {
        &self.server
    }

    /// Registered module names, in start order.
    pub fn module_names(&self) -> Vec<&str> {
        self.modules.names()
    }

    fn pid_file(&self) -> Option<PathBuf> {
        let path = self.config.general.pid_file.trim();
        (!path.is_empty()).then(|| PathBuf::from(path))
    }
}

/// Install SIGTERM/SIGINT handlers and return a future that resolves with
/// the name of the first signal received.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
fn shutdown_signal() -> Result<impl Future<Output = &'static str>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        }
    })
}

/// Write the current process PID to a file.
///
/// Used to prevent duplicate daemon instances.
///
/// # Security
///
/// - Uses `create_new(true)` to atomically create the file
/// - Verifies the created file is a regular file
/// - Creates the parent directory with mode 0o700 and the file with 0o600
///
/// # Errors
///
/// Returns an error if the PID file exists or cannot be written.
pub fn write_pid_file(path: &Path) -> Result<()> {
    use std::fs::{self, OpenOptions};
    use std::io::{ErrorKind, Write};
    use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::DirBuilder::new()
            .mode(0o700)
            .recursive(true)
            .create(parent)?;
    }

    let pid = std::process::id();

    let mut file = match OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
    {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let existing_pid = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_owned());
            return Err(anyhow::anyhow!(
                "PID file {} already exists with PID: {}. Is another instance running?",
                path.display(),
                existing_pid.trim()
            ));
        }
        Err(e) => return Err(e.into()),
    };

    if !file.metadata()?.is_file() {
        let _ = fs::remove_file(path);
        return Err(anyhow::anyhow!(
            "PID file {} is not a regular file",
            path.display()
        ));
    }

    writeln!(file, "{pid}")?;

    tracing::info!(pid = pid, path = %path.display(), "PID file written");
    Ok(())
}

/// Remove the PID file on daemon shutdown.
///
/// Logs a warning but does not fail if the file cannot be removed.
pub fn remove_pid_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove PID file");
    } else {
        tracing::info!(path = %path.display(), "PID file removed");
    }
}
