#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`snapshot`]: 샘플 데이터 타입과 표시 헬퍼
//! - [`tcp`]: `/proc/net/tcp` 상태 집계
//! - [`sampler`]: 샘플러 trait과 `sysinfo` 구현
//! - [`monitor`]: 주기적 샘플링 (Pipeline trait 구현)
//! - [`error`]: 도메인 에러 타입

pub mod error;
pub mod monitor;
pub mod sampler;
pub mod snapshot;
pub mod tcp;

// --- 주요 타입 re-export ---

pub use error::SystemMonitorError;
pub use monitor::{MIN_SAMPLE_INTERVAL, SystemMonitor, SystemSettings};
pub use sampler::{SysinfoSampler, SystemSampler};
pub use snapshot::{
    DiskUsage, LoadAverage, MemoryUsage, NetworkUsage, ProcessUsage, SystemSnapshot,
};
pub use tcp::TcpStateCounts;
