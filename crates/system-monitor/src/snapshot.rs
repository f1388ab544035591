//! 샘플 데이터 -- 한 번의 샘플링 결과와 표시 헬퍼

use crate::tcp::TcpStateCounts;

/// 부하 평균
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoadAverage {
    /// 1분
    pub one: f64,
    /// 5분
    pub five: f64,
    /// 15분
    pub fifteen: f64,
}

/// 메모리/스왑 사용량 (바이트)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryUsage {
    /// 전체 물리 메모리
    pub total: u64,
    /// 사용 중
    pub used: u64,
    /// 사용 가능
    pub available: u64,
    /// 전체 스왑
    pub swap_total: u64,
    /// 사용 중인 스왑
    pub swap_used: u64,
}

impl MemoryUsage {
    /// 메모리 사용률 (%)
    pub fn used_percent(&self) -> f64 {
        percent(self.used, self.total)
    }

    /// 스왑 사용률 (%)
    pub fn swap_percent(&self) -> f64 {
        percent(self.swap_used, self.swap_total)
    }
}

/// 설정한 경로 하나의 디스크 사용량
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskUsage {
    /// 설정한 경로
    pub path: String,
    /// 경로가 속한 마운트 지점
    pub mount_point: String,
    /// 전체 용량 (바이트)
    pub total: u64,
    /// 남은 용량 (바이트)
    pub available: u64,
}

impl DiskUsage {
    /// 사용 중인 용량 (바이트)
    pub fn used(&self) -> u64 {
        self.total.saturating_sub(self.available)
    }

    /// 사용률 (%)
    pub fn used_percent(&self) -> f64 {
        percent(self.used(), self.total)
    }
}

/// 네트워크 누적량과 직전 샘플 대비 초당 전송량
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NetworkUsage {
    /// 누적 수신 바이트
    pub rx_bytes: u64,
    /// 누적 송신 바이트
    pub tx_bytes: u64,
    /// 초당 수신 바이트 (첫 샘플은 0)
    pub rx_bytes_per_sec: f64,
    /// 초당 송신 바이트 (첫 샘플은 0)
    pub tx_bytes_per_sec: f64,
}

/// CPU 사용률 상위 프로세스
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessUsage {
    /// 프로세스 ID
    pub pid: u32,
    /// 프로세스 이름
    pub name: String,
    /// CPU 사용률 (%, 코어 수만큼 100을 넘을 수 있음)
    pub cpu_percent: f32,
    /// 상주 메모리 (바이트)
    pub memory_bytes: u64,
}

/// 한 번의 샘플링 결과
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemSnapshot {
    /// 전체 CPU 사용률 (%)
    pub cpu_percent: f32,
    /// 부하 평균
    pub load: LoadAverage,
    /// 메모리
    pub memory: MemoryUsage,
    /// 디스크
    pub disks: Vec<DiskUsage>,
    /// 네트워크
    pub network: NetworkUsage,
    /// 전체 프로세스 수
    pub process_count: usize,
    /// CPU 사용률 상위 프로세스 (내림차순)
    pub top_processes: Vec<ProcessUsage>,
    /// TCP 상태별 연결 수 (procfs를 읽지 못하면 `None`)
    pub tcp: Option<TcpStateCounts>,
    /// 시스템 가동 시간 (초)
    pub uptime_secs: u64,
}

/// `part / total` 백분율. `total`이 0이면 0.
pub fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 / total as f64 * 100.0
}

/// 소수점 둘째 자리 반올림
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// 사람이 읽기 쉬운 바이트 표기 (1024 단위)
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["KB", "MB", "GB", "TB", "PB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

/// 초당 전송량 표기
pub fn format_rate(bytes_per_sec: f64) -> String {
    format!("{}/s", format_bytes(bytes_per_sec.max(0.0) as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536 * 1024), "1.50 MB");
        assert_eq!(format_bytes(8 * 1024 * 1024 * 1024), "8.00 GB");
    }

    #[test]
    fn format_rate_clamps_negative() {
        assert_eq!(format_rate(-5.0), "0 B/s");
        assert_eq!(format_rate(2048.0), "2.00 KB/s");
    }

    #[test]
    fn percent_of_zero_total_is_zero() {
        assert_eq!(percent(10, 0), 0.0);
        assert_eq!(round2(percent(1, 3)), 33.33);
    }

    #[test]
    fn disk_used_saturates() {
        let disk = DiskUsage {
            path: "/".to_owned(),
            mount_point: "/".to_owned(),
            total: 100,
            available: 150,
        };
        assert_eq!(disk.used(), 0);
        assert_eq!(disk.used_percent(), 0.0);
    }

    #[test]
    fn memory_percentages() {
        let memory = MemoryUsage {
            total: 200,
            used: 50,
            available: 150,
            swap_total: 0,
            swap_used: 0,
        };
        assert_eq!(memory.used_percent(), 25.0);
        assert_eq!(memory.swap_percent(), 0.0);
    }
}
