//! 알림 관리자 -- 버스를 구독하여 이벤트마다 모든 채널로 동시에 전송합니다.
//!
//! ```text
//! EventBus ──Subscription──▶ consumer task ──┬─ spawn ─▶ Feishu.send(event)
//!                                             ├─ spawn ─▶ DingTalk.send(event)
//!                                             └─ spawn ─▶ Telegram.send(event)
//! ```
//!
//! 전송 실패는 채널 이름과 함께 로그로만 남으며 탐지기에 영향을 주지 않습니다.
//! 채널이 하나도 없으면 이벤트를 로그로만 기록합니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use loginwatch_core::SessionEventBus;
use loginwatch_core::bus::Subscription;
use loginwatch_core::config::NotifyConfig;
use loginwatch_core::error::{LoginwatchError, PipelineError};
use loginwatch_core::event::SharedSessionEvent;
use loginwatch_core::metrics as m;
use loginwatch_core::pipeline::{HealthStatus, Pipeline};

use crate::factory::build_notifiers;
use crate::notifier::Notifier;

/// 정지 시 진행 중인 전송을 기다리는 최대 시간
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// 관리자 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManagerState {
    Initialized,
    Running,
    Stopped,
}

/// 누적 카운터
#[derive(Debug, Default)]
pub struct NotifyStats {
    events: AtomicU64,
    sent: AtomicU64,
    failed: AtomicU64,
}

impl NotifyStats {
    /// 수신한 이벤트 수
    pub fn events(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }

    /// 성공한 전송 수
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// 실패한 전송 수
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// 알림 관리자
pub struct NotifyManager {
    bus: SessionEventBus,
    notifiers: Arc<[Arc<dyn Notifier>]>,
    state: ManagerState,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    stats: Arc<NotifyStats>,
    drain_timeout: Duration,
}

impl NotifyManager {
    /// 채널 목록으로 생성합니다.
    pub fn new(bus: SessionEventBus, notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self {
            bus,
            notifiers: notifiers.into(),
            state: ManagerState::Initialized,
            cancel: CancellationToken::new(),
            task: None,
            stats: Arc::new(NotifyStats::default()),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    /// 설정에서 채널을 생성하여 관리자를 만듭니다.
    pub fn from_config(bus: SessionEventBus, config: &NotifyConfig) -> Self {
        Self::new(bus, build_notifiers(config))
    }

    /// 정지 시 진행 중인 전송을 기다리는 시간을 지정합니다.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// 채널 이름 목록
    pub fn notifier_names(&self) -> Vec<&'static str> {
        self.notifiers.iter().map(|n| n.name()).collect()
    }

    /// 누적 카운터
    pub fn stats(&self) -> &Arc<NotifyStats> {
        &self.stats
    }
}

impl Pipeline for NotifyManager {
    async fn start(&mut self) -> Result<(), LoginwatchError> {
        if self.state == ManagerState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        let subscription = self.bus.subscribe();
        self.cancel = CancellationToken::new();

        if self.notifiers.is_empty() {
            warn!("no notifiers enabled, session events will only be logged");
        }

        self.task = Some(tokio::spawn(consume(
            subscription,
            Arc::clone(&self.notifiers),
            Arc::clone(&self.stats),
            self.cancel.clone(),
            self.drain_timeout,
        )));
        self.state = ManagerState::Running;

        info!(notifiers = ?self.notifier_names(), "notify manager started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), LoginwatchError> {
        if self.state != ManagerState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        self.cancel.cancel();
        if let Some(mut task) = self.task.take() {
            // drain 대기보다 약간 길게
            let limit = self.drain_timeout + Duration::from_secs(1);
            match tokio::time::timeout(limit, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "notify consumer ended abnormally"),
                Err(_) => {
                    warn!("notify consumer did not stop in time, aborting");
                    task.abort();
                }
            }
        }

        self.state = ManagerState::Stopped;
        info!(
            events = self.stats.events(),
            sent = self.stats.sent(),
            failed = self.stats.failed(),
            "notify manager stopped"
        );
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            ManagerState::Running if self.notifiers.is_empty() => {
                HealthStatus::Degraded("no notifiers enabled (log-only)".to_owned())
            }
            ManagerState::Running => HealthStatus::Healthy,
            ManagerState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            ManagerState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

async fn consume(
    mut subscription: Subscription<SharedSessionEvent>,
    notifiers: Arc<[Arc<dyn Notifier>]>,
    stats: Arc<NotifyStats>,
    cancel: CancellationToken,
    drain_timeout: Duration,
) {
    let mut inflight = JoinSet::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            Some(_) = inflight.join_next(), if !inflight.is_empty() => {}
            event = subscription.recv() => {
                let Some(event) = event else {
                    debug!("event bus subscription closed");
                    break;
                };
                stats.events.fetch_add(1, Ordering::Relaxed);
                info!(
                    kind = %event.kind,
                    username = %event.username,
                    ip = %event.ip,
                    port = %event.port,
                    hostname = %event.server_info.hostname,
                    "session event received"
                );

                for notifier in notifiers.iter() {
                    inflight.spawn(deliver(
                        Arc::clone(notifier),
                        Arc::clone(&event),
                        Arc::clone(&stats),
                    ));
                }
            }
        }
    }

    // 구독 해제 후 진행 중인 전송 마무리
    drop(subscription);
    let drain = async { while inflight.join_next().await.is_some() {} };
    if tokio::time::timeout(drain_timeout, drain).await.is_err() {
        warn!(
            pending = inflight.len(),
            "pending notifications did not finish in time, aborting"
        );
        inflight.abort_all();
    }
}

async fn deliver(
    notifier: Arc<dyn Notifier>,
    event: SharedSessionEvent,
    stats: Arc<NotifyStats>,
) {
    let name = notifier.name();
    let result = notifier.send(&event).await;
    let label = if result.is_ok() { "success" } else { "failure" };
    metrics::counter!(
        m::NOTIFY_SENT_TOTAL,
        m::LABEL_NOTIFIER => name,
        m::LABEL_RESULT => label
    )
    .increment(1);

    match result {
        Ok(()) => {
            stats.sent.fetch_add(1, Ordering::Relaxed);
            debug!(notifier = name, event_id = %event.id, "notification delivered");
        }
        Err(e) => {
            stats.failed.fetch_add(1, Ordering::Relaxed);
            error!(notifier = name, event_id = %event.id, error = %e, "notification failed");
        }
    }
}
