//! 시스템 모니터 에러 타입

use loginwatch_core::error::{ConfigError, LoginwatchError, SystemError};

/// 시스템 자원 샘플링 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum SystemMonitorError {
    /// procfs 파일 읽기 실패
    #[error("failed to read {path}: {source}")]
    ProcRead {
        /// 파일 경로
        path: String,
        /// 원인
        #[source]
        source: std::io::Error,
    },

    /// 샘플 수집 실패
    #[error("sample failed: {0}")]
    Sample(String),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl From<SystemMonitorError> for LoginwatchError {
    fn from(err: SystemMonitorError) -> Self {
        match err {
            SystemMonitorError::Config { field, reason } => {
                ConfigError::InvalidValue { field, reason }.into()
            }
            other => SystemError::Sample(other.to_string()).into(),
        }
    }
}
