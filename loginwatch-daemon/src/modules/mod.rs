//! Module registry and initialization.
//!
//! Each loginwatch component is wrapped as a [`ModuleHandle`] that provides
//! uniform lifecycle management via the [`DynPipeline`] trait.
//!
//! The [`ModuleRegistry`] tracks all registered modules and supports
//! ordered start/stop operations.

pub mod detector;
pub mod notify;
pub mod server_monitor;
pub mod system_monitor;

use loginwatch_core::pipeline::{DynPipeline, HealthStatus};

/// A handle to a registered module.
pub struct ModuleHandle {
    /// Module name for logging and health reporting.
    pub name: String,
    /// The module's pipeline implementation (start/stop/health_check).
    pub pipeline: Box<dyn DynPipeline>,
}

impl ModuleHandle {
    /// Create a new module handle.
    pub fn new(name: impl Into<String>, pipeline: Box<dyn DynPipeline>) -> Self {
        Self {
            name: name.into(),
            pipeline,
        }
    }

    /// Check the module's health status.
    pub async fn health_check(&self) -> HealthStatus {
        self.pipeline.health_check().await
    }
}

/// Registry of loginwatch modules.
///
/// Modules start in registration order and stop in reverse.
pub struct ModuleRegistry {
    modules: Vec<ModuleHandle>,
    /// Number of modules (from the front) that started successfully.
    started: usize,
}

impl ModuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
            started: 0,
        }
    }

    /// Register a module.
    ///
    /// Register in start order: dependencies and consumers first,
    /// the event producer last.
    pub fn register(&mut self, handle: ModuleHandle) {
        self.modules.push(handle);
    }

    /// Start all modules in registration order.
    ///
    /// Stops at the first failure. Modules started before the failure stay
    /// running; call [`stop_all`](Self::stop_all) to roll them back.
    pub async fn start_all(&mut self) -> anyhow::Result<()> {
        for handle in self.modules.iter_mut().skip(self.started) {
            tracing::info!(module = %handle.name, "starting module");
            handle
                .pipeline
                .start()
                .await
                .map_err(|e| anyhow::anyhow!("failed to start module '{}': {}", handle.name, e))?;
            self.started += 1;
            tracing::info!(module = %handle.name, "module started successfully");
        }
        Ok(())
    }

    /// Stop every started module in reverse registration order.
    ///
    /// Logs errors but continues stopping the remaining modules.
    pub async fn stop_all(&mut self) -> anyhow::Result<()> {
        let mut errors = Vec::new();

        for handle in self.modules[..self.started].iter_mut().rev() {
            tracing::info!(module = %handle.name, "stopping module");
            if let Err(e) = handle.pipeline.stop().await {
                tracing::error!(module = %handle.name, error = %e, "failed to stop module");
                errors.push(format!("{}: {}", handle.name, e));
            } else {
                tracing::info!(module = %handle.name, "module stopped successfully");
            }
        }
        self.started = 0;

        if !errors.is_empty() {
            return Err(anyhow::anyhow!(
                "errors stopping modules: {}",
                errors.join("; ")
            ));
        }

        Ok(())
    }

    /// Health status for all modules, in registration order.
    pub async fn health_statuses(&self) -> Vec<(String, HealthStatus)> {
        let mut statuses = Vec::with_capacity(self.modules.len());
        for handle in &self.modules {
            statuses.push((handle.name.clone(), handle.health_check().await));
        }
        statuses
    }

    /// Registered module names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name.as_str()).collect()
    }

    /// Number of registered modules.
    pub fn count(&self) -> usize {
        self.modules.len()
    }

    /// Number of modules currently started.
    pub fn started_count(&self) -> usize {
        self.started
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
