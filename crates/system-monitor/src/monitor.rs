//! 주기적 샘플링 -- [`SystemSampler`]를 일정 주기로 호출하여 로그와 메트릭으로 보고합니다.
//!
//! ```text
//! interval tick ──▶ spawn_blocking(sampler.sample()) ──▶ report() ──▶ tracing + metrics
//!                                                     └──▶ latest snapshot (watch)
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use loginwatch_core::config::SystemConfig;
use loginwatch_core::error::{LoginwatchError, PipelineError};
use loginwatch_core::metrics as m;
use loginwatch_core::pipeline::{HealthStatus, Pipeline};

use crate::error::SystemMonitorError;
use crate::sampler::SystemSampler;
use crate::snapshot::{SystemSnapshot, format_bytes, format_rate, round2};

/// 샘플링 주기의 하한
pub const MIN_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// 시스템 모니터 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemSettings {
    /// 샘플링 주기
    pub interval: Duration,
    /// 디스크 사용량을 보고할 경로
    pub disk_paths: Vec<String>,
    /// 상위 프로세스 보고 개수
    pub top_processes: usize,
}

impl SystemSettings {
    /// 코어 설정에서 변환합니다.
    pub fn from_core(config: &SystemConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs),
            disk_paths: config.disk_paths.clone(),
            top_processes: config.top_processes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MonitorState {
    Initialized,
    Running,
    Stopped,
}

/// 샘플링 태스크와 모니터가 함께 보는 상태
struct Shared {
    latest: watch::Sender<Option<Arc<SystemSnapshot>>>,
    last_error: Mutex<Option<String>>,
    samples: AtomicU64,
    failures: AtomicU64,
}

impl Shared {
    fn set_error(&self, error: Option<String>) {
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = error;
    }

    fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// 시스템 자원 모니터
///
/// 샘플 실패는 태스크를 멈추지 않습니다. 마지막 샘플이 실패했으면 `Degraded`를
/// 보고하고, 다음 샘플이 성공하면 `Healthy`로 돌아옵니다.
pub struct SystemMonitor<S: SystemSampler> {
    sampler: Arc<Mutex<S>>,
    interval: Duration,
    shared: Arc<Shared>,
    state: MonitorState,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl<S: SystemSampler> SystemMonitor<S> {
    /// 새 모니터를 생성합니다. `interval`은 [`MIN_SAMPLE_INTERVAL`] 이상으로 보정됩니다.
    pub fn new(sampler: S, interval: Duration) -> Self {
        if interval < MIN_SAMPLE_INTERVAL {
            warn!(
                requested_ms = interval.as_millis() as u64,
                min_ms = MIN_SAMPLE_INTERVAL.as_millis() as u64,
                "system sample interval too small, clamping"
            );
        }
        let (latest, _rx) = watch::channel(None);
        Self {
            sampler: Arc::new(Mutex::new(sampler)),
            interval: interval.max(MIN_SAMPLE_INTERVAL),
            shared: Arc::new(Shared {
                latest,
                last_error: Mutex::new(None),
                samples: AtomicU64::new(0),
                failures: AtomicU64::new(0),
            }),
            state: MonitorState::Initialized,
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    /// 실제 적용되는 샘플링 주기
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 마지막으로 성공한 샘플
    pub fn latest(&self) -> Option<Arc<SystemSnapshot>> {
        self.shared.latest.borrow().clone()
    }

    /// 최신 샘플 구독
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<SystemSnapshot>>> {
        self.shared.latest.subscribe()
    }

    /// 성공한 샘플 수
    pub fn sample_count(&self) -> u64 {
        self.shared.samples.load(Ordering::Relaxed)
    }

    /// 실패한 샘플 수
    pub fn failure_count(&self) -> u64 {
        self.shared.failures.load(Ordering::Relaxed)
    }
}

/// 블로킹 풀에서 한 번 샘플링합니다.
async fn sample_once<S: SystemSampler>(
    sampler: &Arc<Mutex<S>>,
) -> Result<SystemSnapshot, SystemMonitorError> {
    let sampler = Arc::clone(sampler);
    tokio::task::spawn_blocking(move || {
        sampler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sample()
    })
    .await
    .map_err(|e| SystemMonitorError::Sample(format!("sampler task failed: {e}")))?
}

/// 샘플을 구조화 로그와 게이지로 남깁니다.
pub fn report(snapshot: &SystemSnapshot) {
    info!(
        cpu_percent = round2(f64::from(snapshot.cpu_percent)),
        load1 = round2(snapshot.load.one),
        load5 = round2(snapshot.load.five),
        load15 = round2(snapshot.load.fifteen),
        memory_used = %format_bytes(snapshot.memory.used),
        memory_total = %format_bytes(snapshot.memory.total),
        memory_percent = round2(snapshot.memory.used_percent()),
        swap_percent = round2(snapshot.memory.swap_percent()),
        processes = snapshot.process_count,
        uptime_secs = snapshot.uptime_secs,
        "system status"
    );

    for disk in &snapshot.disks {
        info!(
            path = %disk.path,
            mount_point = %disk.mount_point,
            used = %format_bytes(disk.used()),
            total = %format_bytes(disk.total),
            used_percent = round2(disk.used_percent()),
            "disk usage"
        );
    }

    info!(
        rx_total = %format_bytes(snapshot.network.rx_bytes),
        tx_total = %format_bytes(snapshot.network.tx_bytes),
        rx_rate = %format_rate(snapshot.network.rx_bytes_per_sec),
        tx_rate = %format_rate(snapshot.network.tx_bytes_per_sec),
        "network usage"
    );

    if let Some(tcp) = &snapshot.tcp {
        info!(
            total = tcp.total(),
            established = tcp.established,
            listen = tcp.listen,
            time_wait = tcp.time_wait,
            close_wait = tcp.close_wait,
            syn_recv = tcp.syn_recv,
            "tcp states"
        );
        metrics::gauge!(m::SYSTEM_TCP_ESTABLISHED).set(tcp.established as f64);
    }

    for (rank, process) in snapshot.top_processes.iter().enumerate() {
        debug!(
            rank = rank + 1,
            pid = process.pid,
            name = %process.name,
            cpu_percent = round2(f64::from(process.cpu_percent)),
            memory = %format_bytes(process.memory_bytes),
            "top process"
        );
    }

    metrics::gauge!(m::SYSTEM_CPU_USAGE_PERCENT).set(f64::from(snapshot.cpu_percent));
    metrics::gauge!(m::SYSTEM_MEMORY_USED_BYTES).set(snapshot.memory.used as f64);
    metrics::gauge!(m::SYSTEM_LOAD1).set(snapshot.load.one);
    metrics::gauge!(m::SYSTEM_PROCESSES).set(snapshot.process_count as f64);
}

impl<S: SystemSampler> Pipeline for SystemMonitor<S> {
    async fn start(&mut self) -> Result<(), LoginwatchError> {
        if self.state == MonitorState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        self.cancel = CancellationToken::new();
        let cancel = self.cancel.clone();
        let sampler = Arc::clone(&self.sampler);
        let shared = Arc::clone(&self.shared);
        let period = self.interval;

        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match sample_once(&sampler).await {
                            Ok(snapshot) => {
                                report(&snapshot);
                                shared.samples.fetch_add(1, Ordering::Relaxed);
                                shared.set_error(None);
                                shared.latest.send_replace(Some(Arc::new(snapshot)));
                            }
                            Err(e) => {
                                warn!(error = %e, "system sample failed");
                                metrics::counter!(m::SYSTEM_SAMPLE_FAILURES_TOTAL).increment(1);
                                shared.failures.fetch_add(1, Ordering::Relaxed);
                                shared.set_error(Some(e.to_string()));
                            }
                        }
                    }
                    _ = cancel.cancelled() => break,
                }
            }
        }));

        self.state = MonitorState::Running;
        info!(interval_secs = period.as_secs(), "system monitor started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), LoginwatchError> {
        if self.state != MonitorState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        self.cancel.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!(error = %e, "system monitor task ended abnormally");
        }

        self.state = MonitorState::Stopped;
        info!(
            samples = self.sample_count(),
            failures = self.failure_count(),
            "system monitor stopped"
        );
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            MonitorState::Running => match self.shared.last_error() {
                Some(reason) => HealthStatus::Degraded(reason),
                None => HealthStatus::Healthy,
            },
            MonitorState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            MonitorState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}
