//! 세션 탐지기 -- 로그 추적, 라인 처리, 중복 기록 정리의 생명주기를 관리합니다.
//!
//! [`SessionDetector`]는 core의 [`Pipeline`] trait을 구현하여
//! 데몬에서 다른 모듈과 같은 방식으로 시작/정지됩니다.
//!
//! # 내부 태스크
//! ```text
//! tail -c +<len+1> -F <log> ─stdout─▶ read loop (LineProcessor) ─publish─▶ EventBus
//!                               janitor (DedupWindow::purge_expired)
//! ```
//!
//! 읽기 루프가 취소 외의 이유로 끝나면 상태가 [`DetectorState::Exited`]로 바뀌고
//! [`SessionDetector::status_watch`]로 관측할 수 있습니다.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::BufReader;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use loginwatch_core::bus::Subscription;
use loginwatch_core::error::{LoginwatchError, PipelineError};
use loginwatch_core::event::SharedSessionEvent;
use loginwatch_core::pipeline::{HealthStatus, Pipeline};
use loginwatch_core::{SessionEventBus, bus::DEFAULT_SUBSCRIBER_CAPACITY};

use crate::config::DetectorSettings;
use crate::dedup::DedupWindow;
use crate::error::DetectorError;
use crate::logpath::LogPathResolver;
use crate::processor::{DetectorStats, DetectorStatsSnapshot, LineProcessor};
use crate::server::ServerInfoHandle;
use crate::tailer::{ReadLoopExit, TailProcess, run_read_loop, spawn_tail};

/// 탐지기 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectorState {
    /// 아직 시작하지 않음
    NotStarted,
    /// 실행 중
    Running,
    /// 정지 진행 중
    Stopping,
    /// 정지됨
    Stopped,
    /// 읽기 루프가 스스로 종료됨 (사유 포함)
    Exited(String),
}

impl DetectorState {
    /// 상태 이름
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Exited(_) => "exited",
        }
    }
}

/// SSH 세션 탐지기
///
/// # 사용 예시
/// ```ignore
/// use loginwatch_session_detector::SessionDetectorBuilder;
///
/// let (mut detector, sub) = SessionDetectorBuilder::new()
///     .settings(settings)
///     .server_info(monitor.handle())
///     .build()?;
///
/// detector.start().await?;
/// ```
pub struct SessionDetector {
    settings: DetectorSettings,
    bus: SessionEventBus,
    server: ServerInfoHandle,
    resolver: LogPathResolver,
    state: Arc<watch::Sender<DetectorState>>,
    stats: Arc<DetectorStats>,
    dedup: Option<Arc<DedupWindow>>,
    log_path: Option<PathBuf>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl SessionDetector {
    /// 현재 상태
    pub fn state(&self) -> DetectorState {
        self.state.borrow().clone()
    }

    /// 상태 변화 구독
    pub fn status_watch(&self) -> watch::Receiver<DetectorState> {
        self.state.subscribe()
    }

    /// 감시 중인 로그 경로 (시작 후)
    pub fn log_path(&self) -> Option<&PathBuf> {
        self.log_path.as_ref()
    }

    /// 누적 카운터
    pub fn stats(&self) -> DetectorStatsSnapshot {
        self.stats.snapshot()
    }

    /// 중복 억제 윈도우에 남아 있는 항목 수
    pub fn pending_dedup_entries(&self) -> usize {
        self.dedup.as_ref().map_or(0, |d| d.len())
    }

    /// 이벤트 버스 핸들
    pub fn bus(&self) -> &SessionEventBus {
        &self.bus
    }

    fn spawn_read_loop(
        &self,
        tail: TailProcess,
        mut processor: LineProcessor,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let TailProcess { mut child, stdout } = tail;
            let exit = run_read_loop(BufReader::new(stdout), &mut processor, cancel.clone()).await;

            if let Err(e) = child.kill().await {
                debug!(error = %e, "tail process already gone");
            }

            match exit {
                ReadLoopExit::Cancelled => debug!("read loop cancelled"),
                abnormal => {
                    let reason = match abnormal {
                        ReadLoopExit::Failed(reason) => reason,
                        _ => "tail output ended".to_owned(),
                    };
                    error!(reason = %reason, "auth log read loop exited");
                    state.send_if_modified(|s| {
                        if *s == DetectorState::Running {
                            *s = DetectorState::Exited(reason.clone());
                            true
                        } else {
                            false
                        }
                    });
                    // janitor도 함께 종료
                    cancel.cancel();
                }
            }
        })
    }
}

impl Pipeline for SessionDetector {
    async fn start(&mut self) -> Result<(), LoginwatchError> {
        match self.state() {
            DetectorState::Running | DetectorState::Stopping => {
                return Err(PipelineError::AlreadyRunning.into());
            }
            DetectorState::NotStarted | DetectorState::Stopped | DetectorState::Exited(_) => {}
        }

        self.settings.validate()?;
        let path = self.resolver.resolve(self.settings.log_file.as_deref())?;

        let dedup = Arc::new(DedupWindow::new(self.settings.dedup_window));
        let processor = LineProcessor::new(
            Arc::clone(&dedup),
            self.bus.clone(),
            self.server.clone(),
            Arc::clone(&self.stats),
        )?;
        // 경로 결정 시점의 길이 이후 바이트는 모두 처리 대상
        let offset = tokio::fs::metadata(&path)
            .await
            .map_err(|e| DetectorError::LogFile {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?
            .len();
        let tail = spawn_tail(&self.settings.tail_command, &path, offset)?;

        // 읽기 루프 spawn 전에 Running이어야 Exited 전이가 유실되지 않음
        self.state.send_replace(DetectorState::Running);
        self.cancel = CancellationToken::new();
        self.tasks.clear();
        self.tasks
            .push(dedup.spawn_janitor(self.settings.dedup_sweep_interval, self.cancel.clone()));
        self.tasks
            .push(self.spawn_read_loop(tail, processor, self.cancel.clone()));

        info!(
            path = %path.display(),
            offset,
            dedup_window_ms = self.settings.dedup_window.as_millis() as u64,
            "session detector started"
        );

        self.dedup = Some(dedup);
        self.log_path = Some(path);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), LoginwatchError> {
        match self.state() {
            DetectorState::Running | DetectorState::Exited(_) => {}
            _ => return Err(PipelineError::NotRunning.into()),
        }

        info!("stopping session detector");
        self.state.send_replace(DetectorState::Stopping);
        self.cancel.cancel();

        for mut task in self.tasks.drain(..) {
            match tokio::time::timeout(self.settings.stop_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "detector task ended abnormally"),
                Err(_) => {
                    warn!(
                        timeout_ms = self.settings.stop_timeout.as_millis() as u64,
                        "detector task did not stop in time, aborting"
                    );
                    task.abort();
                }
            }
        }

        self.state.send_replace(DetectorState::Stopped);
        info!(stats = ?self.stats.snapshot(), "session detector stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state() {
            DetectorState::Running => HealthStatus::Healthy,
            DetectorState::Exited(reason) => {
                HealthStatus::Unhealthy(format!("read loop exited: {reason}"))
            }
            DetectorState::NotStarted => HealthStatus::Unhealthy("not started".to_owned()),
            DetectorState::Stopping | DetectorState::Stopped => {
                HealthStatus::Unhealthy("stopped".to_owned())
            }
        }
    }
}

/// 세션 탐지기 빌더
///
/// 외부 버스를 지정하지 않으면 새 버스를 만들고 그 구독을 함께 반환합니다.
pub struct SessionDetectorBuilder {
    settings: DetectorSettings,
    bus: Option<SessionEventBus>,
    bus_capacity: usize,
    server: Option<ServerInfoHandle>,
    resolver: Option<LogPathResolver>,
}

impl SessionDetectorBuilder {
    /// 기본값으로 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            settings: DetectorSettings::default(),
            bus: None,
            bus_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
            server: None,
            resolver: None,
        }
    }

    /// 탐지기 설정
    pub fn settings(mut self, settings: DetectorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// 외부 이벤트 버스
    pub fn bus(mut self, bus: SessionEventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// 내부 버스를 만들 때 구독자별 버퍼 크기
    pub fn bus_capacity(mut self, capacity: usize) -> Self {
        self.bus_capacity = capacity;
        self
    }

    /// 서버 정보 핸들
    pub fn server_info(mut self, server: ServerInfoHandle) -> Self {
        self.server = Some(server);
        self
    }

    /// 로그 경로 결정기
    pub fn resolver(mut self, resolver: LogPathResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// 탐지기를 생성합니다.
    pub fn build(
        self,
    ) -> Result<(SessionDetector, Option<Subscription<SharedSessionEvent>>), DetectorError> {
        self.settings.validate()?;

        let server = self.server.ok_or_else(|| DetectorError::Config {
            field: "server_info".to_owned(),
            reason: "server info handle is required".to_owned(),
        })?;

        let (bus, subscription) = match self.bus {
            Some(bus) => (bus, None),
            None => {
                let bus = SessionEventBus::new(self.bus_capacity);
                let sub = bus.subscribe();
                (bus, Some(sub))
            }
        };

        let (state, _) = watch::channel(DetectorState::NotStarted);
        let detector = SessionDetector {
            settings: self.settings,
            bus,
            server,
            resolver: self.resolver.unwrap_or_default(),
            state: Arc::new(state),
            stats: Arc::new(DetectorStats::default()),
            dedup: None,
            log_path: None,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        };

        Ok((detector, subscription))
    }
}

impl Default for SessionDetectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
