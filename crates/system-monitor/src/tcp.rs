//! TCP 연결 상태 집계 -- `/proc/net/tcp` 형식의 네 번째 열(`st`)을 셉니다.
//!
//! ```text
//!   sl  local_address rem_address   st tx_queue rx_queue ...
//!    0: 0100007F:0277 00000000:0000 0A 00000000:00000000 ...
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::SystemMonitorError;

/// 기본 procfs 경로
pub const PROC_NET_TCP: [&str; 2] = ["/proc/net/tcp", "/proc/net/tcp6"];

/// 기본 procfs 경로 목록
pub fn default_tcp_paths() -> Vec<PathBuf> {
    PROC_NET_TCP.iter().map(PathBuf::from).collect()
}

/// 상태별 TCP 연결 수
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TcpStateCounts {
    pub established: usize,
    pub syn_sent: usize,
    pub syn_recv: usize,
    pub fin_wait1: usize,
    pub fin_wait2: usize,
    pub time_wait: usize,
    pub close: usize,
    pub close_wait: usize,
    pub last_ack: usize,
    pub listen: usize,
    pub closing: usize,
}

impl TcpStateCounts {
    /// 커널 상태 코드 하나를 셉니다. 모르는 코드는 무시합니다.
    pub fn record(&mut self, state: u8) {
        let slot = match state {
            0x01 => &mut self.established,
            0x02 => &mut self.syn_sent,
            0x03 => &mut self.syn_recv,
            0x04 => &mut self.fin_wait1,
            0x05 => &mut self.fin_wait2,
            0x06 => &mut self.time_wait,
            0x07 => &mut self.close,
            0x08 => &mut self.close_wait,
            0x09 => &mut self.last_ack,
            0x0A => &mut self.listen,
            0x0B => &mut self.closing,
            _ => return,
        };
        *slot += 1;
    }

    /// 다른 집계를 더합니다.
    pub fn merge(&mut self, other: &Self) {
        self.established += other.established;
        self.syn_sent += other.syn_sent;
        self.syn_recv += other.syn_recv;
        self.fin_wait1 += other.fin_wait1;
        self.fin_wait2 += other.fin_wait2;
        self.time_wait += other.time_wait;
        self.close += other.close;
        self.close_wait += other.close_wait;
        self.last_ack += other.last_ack;
        self.listen += other.listen;
        self.closing += other.closing;
    }

    /// 전체 연결 수
    pub fn total(&self) -> usize {
        self.established
            + self.syn_sent
            + self.syn_recv
            + self.fin_wait1
            + self.fin_wait2
            + self.time_wait
            + self.close
            + self.close_wait
            + self.last_ack
            + self.listen
            + self.closing
    }
}

/// `/proc/net/tcp` 내용을 집계합니다. 헤더와 형식이 맞지 않는 줄은 건너뜁니다.
pub fn parse_proc_net_tcp(content: &str) -> TcpStateCounts {
    let mut counts = TcpStateCounts::default();
    for line in content.lines().skip(1) {
        let Some(state) = line.split_whitespace().nth(3) else {
            continue;
        };
        if let Ok(state) = u8::from_str_radix(state, 16) {
            counts.record(state);
        }
    }
    counts
}

/// 여러 파일을 읽어 합산합니다.
///
/// 없는 파일(IPv6 비활성 커널의 `tcp6` 등)은 건너뛰지만, 하나도 읽지 못하면 에러입니다.
pub fn read_tcp_states(paths: &[PathBuf]) -> Result<TcpStateCounts, SystemMonitorError> {
    let mut total = TcpStateCounts::default();
    let mut read_any = false;
    let mut first_error = None;

    for path in paths {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                total.merge(&parse_proc_net_tcp(&content));
                read_any = true;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                first_error.get_or_insert_with(|| proc_read(path, e));
            }
        }
    }

    match (read_any, first_error) {
        (true, _) => Ok(total),
        (false, Some(err)) => Err(err),
        (false, None) => Err(SystemMonitorError::Sample(format!(
            "none of {} tcp tables exist",
            paths.len()
        ))),
    }
}

fn proc_read(path: &Path, source: std::io::Error) -> SystemMonitorError {
    SystemMonitorError::ProcRead {
        path: path.display().to_string(),
        source,
    }
}
