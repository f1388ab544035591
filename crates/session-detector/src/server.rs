//! 서버 식별 정보 -- 호스트명, IP, OS 이름을 결정하고 주기적으로 갱신합니다.
//!
//! ```text
//! ServerInfoProvider ──resolve()──▶ ServerMonitor ──watch──▶ ServerInfoHandle (탐지기)
//!                                      │
//!                                      └── refresh_interval 마다 재조회
//! ```
//!
//! 탐지기는 이벤트를 발행할 때 [`ServerInfoHandle::current`]로 최신 스냅샷만 읽습니다.
//! 라인마다 다시 조회하지 않으며, 약간 오래된 값도 허용됩니다.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use loginwatch_core::error::{LoginwatchError, PipelineError};
use loginwatch_core::pipeline::{HealthStatus, Pipeline};
use loginwatch_core::types::{ServerInfo, UNKNOWN};

use crate::error::DetectorError;
use crate::logpath::{OS_RELEASE_PATH, OsRelease};

/// 갱신 주기의 하한. 0 주기는 타이머를 만들 수 없으므로 이 값으로 올립니다.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(100);

/// 서버 식별 정보 제공자
///
/// 테스트에서는 고정 값을 반환하는 구현으로 대체합니다.
pub trait ServerInfoProvider: Send + Sync + 'static {
    /// 현재 서버 정보를 조회합니다.
    fn resolve(&self) -> Result<ServerInfo, DetectorError>;
}

/// 실제 시스템에서 서버 정보를 조회하는 제공자
#[derive(Debug, Clone)]
pub struct SystemServerInfo {
    os_release: PathBuf,
}

impl Default for SystemServerInfo {
    fn default() -> Self {
        Self {
            os_release: PathBuf::from(OS_RELEASE_PATH),
        }
    }
}

impl SystemServerInfo {
    /// os-release 경로를 지정하여 생성합니다.
    pub fn with_os_release(path: impl Into<PathBuf>) -> Self {
        Self {
            os_release: path.into(),
        }
    }
}

impl ServerInfoProvider for SystemServerInfo {
    fn resolve(&self) -> Result<ServerInfo, DetectorError> {
        let hostname = hostname::get()
            .map_err(|e| DetectorError::ServerInfo(format!("get hostname failed: {e}")))?
            .into_string()
            .unwrap_or_else(|raw| raw.to_string_lossy().into_owned());

        let addrs = interface_ipv4_addrs()
            .map_err(|e| DetectorError::ServerInfo(format!("list interfaces failed: {e}")))?;
        let ip = pick_server_ip(&addrs).ok_or_else(|| {
            DetectorError::ServerInfo("no non-loopback IPv4 address found".to_owned())
        })?;

        let os_type = OsRelease::read(&self.os_release)
            .and_then(|r| r.display_name())
            .unwrap_or_else(|| UNKNOWN.to_owned());

        Ok(ServerInfo::new(hostname, ip.to_string(), os_type))
    }
}

/// 루프백이 아닌 첫 번째 IPv4 주소를 고릅니다.
pub fn pick_server_ip(addrs: &[Ipv4Addr]) -> Option<Ipv4Addr> {
    addrs
        .iter()
        .copied()
        .find(|ip| !ip.is_loopback() && !ip.is_unspecified())
}

/// 모든 인터페이스의 IPv4 주소를 열거 순서대로 반환합니다.
fn interface_ipv4_addrs() -> std::io::Result<Vec<Ipv4Addr>> {
    let addrs = if_addrs::get_if_addrs()?
        .into_iter()
        .filter_map(|iface| match iface.ip() {
            IpAddr::V4(ip) => Some(ip),
            IpAddr::V6(_) => None,
        })
        .collect();
    Ok(addrs)
}

/// 최신 서버 정보 스냅샷을 읽는 핸들
#[derive(Debug, Clone)]
pub struct ServerInfoHandle {
    rx: watch::Receiver<Arc<ServerInfo>>,
}

impl ServerInfoHandle {
    /// 변하지 않는 고정 값 핸들을 생성합니다.
    pub fn fixed(info: ServerInfo) -> Self {
        let (_tx, rx) = watch::channel(Arc::new(info));
        Self { rx }
    }

    /// 최신 스냅샷
    pub fn current(&self) -> Arc<ServerInfo> {
        Arc::clone(&self.rx.borrow())
    }
}

/// 모니터 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MonitorState {
    Initialized,
    Running,
    Stopped,
}

/// 서버 정보 모니터
///
/// 시작 시 한 번 조회하며 실패하면 시작 자체가 실패합니다.
/// 이후 주기적으로 재조회하고, 재조회 실패 시에는 이전 값을 유지합니다.
pub struct ServerMonitor<P: ServerInfoProvider> {
    provider: Arc<P>,
    refresh_interval: Duration,
    tx: Arc<watch::Sender<Arc<ServerInfo>>>,
    state: MonitorState,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl<P: ServerInfoProvider> ServerMonitor<P> {
    /// 새 모니터를 생성합니다. 시작 전 스냅샷은 모든 필드가 `unknown`입니다.
    ///
    /// `refresh_interval`은 [`MIN_REFRESH_INTERVAL`] 이상으로 보정됩니다.
    pub fn new(provider: P, refresh_interval: Duration) -> Self {
        if refresh_interval < MIN_REFRESH_INTERVAL {
            warn!(
                requested_ms = refresh_interval.as_millis() as u64,
                min_ms = MIN_REFRESH_INTERVAL.as_millis() as u64,
                "server info refresh interval too small, clamping"
            );
        }
        let (tx, _rx) = watch::channel(Arc::new(ServerInfo::unknown()));
        Self {
            provider: Arc::new(provider),
            refresh_interval: refresh_interval.max(MIN_REFRESH_INTERVAL),
            tx: Arc::new(tx),
            state: MonitorState::Initialized,
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    /// 스냅샷 읽기 핸들
    pub fn handle(&self) -> ServerInfoHandle {
        ServerInfoHandle {
            rx: self.tx.subscribe(),
        }
    }

    /// 현재 스냅샷
    pub fn current(&self) -> Arc<ServerInfo> {
        Arc::clone(&self.tx.borrow())
    }

    /// 실제 적용되는 갱신 주기
    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// 즉시 한 번 조회하여 스냅샷을 갱신합니다.
    pub fn refresh(&self) -> Result<Arc<ServerInfo>, DetectorError> {
        let info = Arc::new(self.provider.resolve()?);
        self.tx.send_replace(Arc::clone(&info));
        Ok(info)
    }
}

impl<P: ServerInfoProvider> Pipeline for ServerMonitor<P> {
    async fn start(&mut self) -> Result<(), LoginwatchError> {
        if self.state == MonitorState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        let info = self.refresh()?;
        info!(
            hostname = %info.hostname,
            ip = %info.ip,
            os_type = %info.os_type,
            "server info resolved"
        );

        self.cancel = CancellationToken::new();
        let cancel = self.cancel.clone();
        let provider = Arc::clone(&self.provider);
        let tx = Arc::clone(&self.tx);
        let period = self.refresh_interval;

        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match provider.resolve() {
                            Ok(info) => {
                                info!(
                                    hostname = %info.hostname,
                                    ip = %info.ip,
                                    os_type = %info.os_type,
                                    "server info refreshed"
                                );
                                tx.send_replace(Arc::new(info));
                            }
                            Err(e) => warn!(error = %e, "server info refresh failed, keeping previous snapshot"),
                        }
                    }
                    _ = cancel.cancelled() => break,
                }
            }
        }));

        self.state = MonitorState::Running;
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
            warn!(error = %e, "server monitor task ended abnormally");
        }

        self.state = MonitorState::Stopped;
        info!("server monitor stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            MonitorState::Running => HealthStatus::Healthy,
            MonitorState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            MonitorState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// 호출 순서대로 미리 정한 결과를 돌려주는 제공자
    struct ScriptedProvider {
        results: Mutex<Vec<Result<ServerInfo, String>>>,
    }

    impl ScriptedProvider {
        fn new(mut results: Vec<Result<ServerInfo, String>>) -> Self {
            results.reverse();
            Self {
                results: Mutex::new(results),
            }
        }
    }

    impl ServerInfoProvider for ScriptedProvider {
        fn resolve(&self) -> Result<ServerInfo, DetectorError> {
            let mut results = self.results.lock().unwrap();
            let next = if results.len() > 1 {
                results.pop().unwrap()
            } else {
                results.last().cloned().unwrap()
            };
            next.map_err(DetectorError::ServerInfo)
        }
    }

    fn info(host: &str) -> ServerInfo {
        ServerInfo::new(host, "10.0.0.1", "Debian GNU/Linux 12")
    }

    #[test]
    fn pick_skips_loopback() {
        let addrs = [
            Ipv4Addr::LOCALHOST,
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(192, 168, 1, 2),
        ];
        assert_eq!(pick_server_ip(&addrs), Some(Ipv4Addr::new(10, 0, 0, 1)));
    }

    #[test]
    fn pick_returns_none_for_loopback_only() {
        assert_eq!(pick_server_ip(&[Ipv4Addr::LOCALHOST]), None);
        assert_eq!(pick_server_ip(&[]), None);
    }

    #[test]
    fn fixed_handle_returns_value() {
        let handle = ServerInfoHandle::fixed(info("web-01"));
        assert_eq!(handle.current().hostname, "web-01");
    }

    #[test]
    fn system_provider_reports_os_from_release_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("os-release");
        std::fs::write(&path, "ID=debian\nPRETTY_NAME=\"Debian GNU/Linux 12 (bookworm)\"\n")
            .unwrap();
        // IPv4 인터페이스가 없는 샌드박스에서는 에러가 정상
        match SystemServerInfo::with_os_release(&path).resolve() {
            Ok(info) => {
                assert_eq!(info.os_type, "Debian GNU/Linux 12 (bookworm)");
                assert!(!info.hostname.is_empty());
            }
            Err(e) => assert!(matches!(e, DetectorError::ServerInfo(_))),
        }
    }

    #[tokio::test]
    async fn start_publishes_snapshot_to_handles() {
        let mut monitor = ServerMonitor::new(
            ScriptedProvider::new(vec![Ok(info("web-01"))]),
            Duration::from_secs(60),
        );
        let handle = monitor.handle();
        assert_eq!(handle.current().hostname, UNKNOWN);

        monitor.start().await.unwrap();
        assert_eq!(handle.current().hostname, "web-01");
        assert!(monitor.health_check().await.is_healthy());

        monitor.stop().await.unwrap();
        assert!(monitor.stop().await.is_err());
    }

    #[tokio::test]
    async fn start_fails_when_unresolvable() {
        let mut monitor = ServerMonitor::new(
            ScriptedProvider::new(vec![Err("no non-loopback IPv4 address found".to_owned())]),
            Duration::from_secs(60),
        );
        let err = monitor.start().await.unwrap_err();
        assert!(err.to_string().contains("no non-loopback IPv4"));
        assert!(monitor.health_check().await.is_unhealthy());
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_refresh_updates_and_keeps_previous_on_error() {
        let mut monitor = ServerMonitor::new(
            ScriptedProvider::new(vec![
                Ok(info("web-01")),
                Ok(info("web-02")),
                Err("transient".to_owned()),
            ]),
            Duration::from_secs(10),
        );
        let handle = monitor.handle();
        monitor.start().await.unwrap();
        assert_eq!(handle.current().hostname, "web-01");

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(handle.current().hostname, "web-02");

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(handle.current().hostname, "web-02");

        monitor.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn zero_refresh_interval_is_clamped() {
        let mut monitor = ServerMonitor::new(
            ScriptedProvider::new(vec![Ok(info("web-01"))]),
            Duration::ZERO,
        );
        assert_eq!(monitor.refresh_interval(), MIN_REFRESH_INTERVAL);

        monitor.start().await.unwrap();
        tokio::time::sleep(MIN_REFRESH_INTERVAL * 3).await;
        assert!(monitor.health_check().await.is_healthy());
        monitor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn double_start_is_rejected() {
        let mut monitor = ServerMonitor::new(
            ScriptedProvider::new(vec![Ok(info("web-01"))]),
            Duration::from_secs(60),
        );
        monitor.start().await.unwrap();
        assert!(monitor.start().await.is_err());
        monitor.stop().await.unwrap();
    }
}
