//! 샘플러 -- 한 번의 호출로 [`SystemSnapshot`]을 만듭니다.
//!
//! 실제 구현은 `sysinfo`를 사용하고, 테스트에서는 미리 정한 스냅샷을 돌려주는
//! 구현으로 대체합니다. 호출은 블로킹이므로 모니터는 `spawn_blocking`으로 실행합니다.

use std::path::{Path, PathBuf};
use std::time::Instant;

use sysinfo::{Disks, Networks, System};
use tracing::debug;

use crate::error::SystemMonitorError;
use crate::monitor::SystemSettings;
use crate::snapshot::{
    DiskUsage, LoadAverage, MemoryUsage, NetworkUsage, ProcessUsage, SystemSnapshot,
};
use crate::tcp::{default_tcp_paths, read_tcp_states};

/// 네트워크 합계에서 제외하는 인터페이스
const LOOPBACK_INTERFACE: &str = "lo";

/// 시스템 자원 샘플러
pub trait SystemSampler: Send + 'static {
    /// 현재 자원 사용량을 수집합니다.
    fn sample(&mut self) -> Result<SystemSnapshot, SystemMonitorError>;
}

/// 시점이 기록된 네트워크 누적량
#[derive(Debug, Clone, Copy)]
pub struct NetworkTotals {
    /// 수집 시각
    pub at: Instant,
    /// 누적 수신 바이트
    pub rx: u64,
    /// 누적 송신 바이트
    pub tx: u64,
}

/// `sysinfo` 기반 샘플러
pub struct SysinfoSampler {
    system: System,
    disk_paths: Vec<String>,
    top_processes: usize,
    tcp_paths: Vec<PathBuf>,
    previous_network: Option<NetworkTotals>,
}

impl SysinfoSampler {
    /// 새 샘플러를 생성합니다.
    ///
    /// CPU 사용률은 두 번의 갱신 차이로 계산되므로 생성 시 한 번 갱신해 둡니다.
    pub fn new(settings: &SystemSettings) -> Self {
        let mut system = System::new();
        system.refresh_all();
        Self {
            system,
            disk_paths: settings.disk_paths.clone(),
            top_processes: settings.top_processes,
            tcp_paths: default_tcp_paths(),
            previous_network: None,
        }
    }

    /// TCP 테이블 경로를 바꿉니다.
    pub fn with_tcp_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.tcp_paths = paths;
        self
    }
}

impl std::fmt::Debug for SysinfoSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SysinfoSampler")
            .field("disk_paths", &self.disk_paths)
            .field("top_processes", &self.top_processes)
            .field("tcp_paths", &self.tcp_paths)
            .finish()
    }
}

impl SystemSampler for SysinfoSampler {
    fn sample(&mut self) -> Result<SystemSnapshot, SystemMonitorError> {
        self.system.refresh_all();

        let load = System::load_average();
        let memory = MemoryUsage {
            total: self.system.total_memory(),
            used: self.system.used_memory(),
            available: self.system.available_memory(),
            swap_total: self.system.total_swap(),
            swap_used: self.system.used_swap(),
        };
        if memory.total == 0 {
            return Err(SystemMonitorError::Sample(
                "total memory reported as zero".to_owned(),
            ));
        }

        let disks = Disks::new_with_refreshed_list();
        let mounts: Vec<(String, u64, u64)> = disks
            .list()
            .iter()
            .map(|d| {
                (
                    d.mount_point().display().to_string(),
                    d.total_space(),
                    d.available_space(),
                )
            })
            .collect();

        let networks = Networks::new_with_refreshed_list();
        let (rx, tx) = networks
            .list()
            .iter()
            .filter(|(name, _)| name.as_str() != LOOPBACK_INTERFACE)
            .fold((0u64, 0u64), |(rx, tx), (_, data)| {
                (
                    rx.saturating_add(data.total_received()),
                    tx.saturating_add(data.total_transmitted()),
                )
            });
        let current = NetworkTotals {
            at: Instant::now(),
            rx,
            tx,
        };
        let network = network_usage(self.previous_network, current);
        self.previous_network = Some(current);

        let processes: Vec<ProcessUsage> = self
            .system
            .processes()
            .values()
            .map(|p| ProcessUsage {
                pid: p.pid().as_u32(),
                name: p.name().to_string_lossy().into_owned(),
                cpu_percent: p.cpu_usage(),
                memory_bytes: p.memory(),
            })
            .collect();
        let process_count = processes.len();

        let tcp = match read_tcp_states(&self.tcp_paths) {
            Ok(counts) => Some(counts),
            Err(e) => {
                debug!(error = %e, "tcp states unavailable");
                None
            }
        };

        Ok(SystemSnapshot {
            cpu_percent: self.system.global_cpu_usage(),
            load: LoadAverage {
                one: load.one,
                five: load.five,
                fifteen: load.fifteen,
            },
            memory,
            disks: select_disks(&self.disk_paths, &mounts),
            network,
            process_count,
            top_processes: top_by_cpu(processes, self.top_processes),
            tcp,
            uptime_secs: System::uptime(),
        })
    }
}

/// 설정한 경로마다 마운트 지점이 가장 긴 디스크를 고릅니다.
///
/// `mounts`는 `(마운트 지점, 전체, 남은 용량)` 목록입니다. `paths`가 비어 있으면
/// 모든 마운트를 그대로 보고하며, 어떤 마운트에도 속하지 않는 경로는 생략합니다.
pub fn select_disks(paths: &[String], mounts: &[(String, u64, u64)]) -> Vec<DiskUsage> {
    if paths.is_empty() {
        return mounts
            .iter()
            .map(|(mount, total, available)| DiskUsage {
                path: mount.clone(),
                mount_point: mount.clone(),
                total: *total,
                available: *available,
            })
            .collect();
    }

    paths
        .iter()
        .filter_map(|path| {
            mounts
                .iter()
                .filter(|(mount, _, _)| Path::new(path).starts_with(mount))
                .max_by_key(|(mount, _, _)| Path::new(mount).components().count())
                .map(|(mount, total, available)| DiskUsage {
                    path: path.clone(),
                    mount_point: mount.clone(),
                    total: *total,
                    available: *available,
                })
        })
        .collect()
}

/// 직전 누적량과 비교해 초당 전송량을 계산합니다.
///
/// 첫 샘플이거나 카운터가 줄어든 경우(인터페이스 재생성) 속도는 0입니다.
pub fn network_usage(previous: Option<NetworkTotals>, current: NetworkTotals) -> NetworkUsage {
    let (rx_rate, tx_rate) = match previous {
        Some(prev) => {
            let secs = current.at.saturating_duration_since(prev.at).as_secs_f64();
            if secs > 0.0 {
                (
                    current.rx.saturating_sub(prev.rx) as f64 / secs,
                    current.tx.saturating_sub(prev.tx) as f64 / secs,
                )
            } else {
                (0.0, 0.0)
            }
        }
        None => (0.0, 0.0),
    };
    NetworkUsage {
        rx_bytes: current.rx,
        tx_bytes: current.tx,
        rx_bytes_per_sec: rx_rate,
        tx_bytes_per_sec: tx_rate,
    }
}

/// CPU 사용률 내림차순으로 상위 `n`개를 남깁니다.
pub fn top_by_cpu(mut processes: Vec<ProcessUsage>, n: usize) -> Vec<ProcessUsage> {
    processes.sort_by(|a, b| b.cpu_percent.total_cmp(&a.cpu_percent));
    processes.truncate(n);
    processes
}
