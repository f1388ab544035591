//! Periodic liveness heartbeat.
//!
//! The orchestrator's main loop awaits [`Heartbeat::tick`] alongside the
//! shutdown triggers, and logs uptime together with aggregated module
//! health on every beat.

use std::time::{Duration, Instant};

use tokio::time::{Interval, MissedTickBehavior};

use loginwatch_core::config::HeartbeatConfig;
use loginwatch_core::metrics as m;
use loginwatch_core::pipeline::HealthStatus;

/// Heartbeat timer.
///
/// A disabled heartbeat never ticks.
pub struct Heartbeat {
    interval: Option<Interval>,
    period: Duration,
    started: Instant,
}

impl Heartbeat {
    /// Create a heartbeat from configuration. The first beat fires one
    /// full period after `started`.
    pub fn new(config: &HeartbeatConfig, started: Instant) -> Self {
        let period = Duration::from_secs(config.interval_secs.max(1));
        let interval = config.enabled.then(|| {
            let mut interval =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });

        Self {
            interval,
            period,
            started,
        }
    }

    /// Whether the heartbeat is enabled.
    pub fn is_enabled(&self) -> bool {
        self.interval.is_some()
    }

    /// Configured beat period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Time elapsed since the daemon started.
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Wait for the next beat and return the uptime at that moment.
    ///
    /// Pends forever when disabled, so it is safe inside `select!`.
    pub async fn tick(&mut self) -> Duration {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
                self.uptime()
            }
            None => std::future::pending().await,
        }
    }

    /// Log one beat and update the uptime gauge.
    pub fn record(&self, uptime: Duration, health: &HealthStatus) {
        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(uptime.as_secs() as f64);

        match health {
            HealthStatus::Healthy => tracing::info!(
                uptime_secs = uptime.as_secs(),
                interval_secs = self.period.as_secs(),
                "heartbeat"
            ),
            other => tracing::warn!(
                uptime_secs = uptime.as_secs(),
                interval_secs = self.period.as_secs(),
                health = %other,
                "heartbeat"
            ),
        }
    }
}
