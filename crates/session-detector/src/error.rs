//! 세션 탐지기 에러 타입
//!
//! [`DetectorError`]는 탐지기 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<DetectorError> for LoginwatchError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use loginwatch_core::error::{ConfigError, DetectionError, LoginwatchError};

/// 세션 탐지기 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    /// 감시 대상 로그 파일을 열 수 없음
    #[error("log file error: {path}: {reason}")]
    LogFile {
        /// 로그 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 자동 탐색으로 로그 파일을 찾지 못함
    #[error("no readable auth log found (tried: {tried})")]
    LogPathUnresolved {
        /// 시도한 경로 목록
        tried: String,
    },

    /// 서버 식별 정보 결정 실패
    #[error("server info error: {0}")]
    ServerInfo(String),

    /// tail 프로세스 실행/읽기 실패
    #[error("tailer error: {0}")]
    Tailer(String),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl From<DetectorError> for LoginwatchError {
    fn from(err: DetectorError) -> Self {
        match err {
            DetectorError::LogFile { .. } | DetectorError::LogPathUnresolved { .. } => {
                DetectionError::LogSource(err.to_string()).into()
            }
            DetectorError::ServerInfo(reason) => DetectionError::ServerIdentity(reason).into(),
            DetectorError::Tailer(reason) => DetectionError::Tailer(reason).into(),
            DetectorError::Regex(e) => DetectionError::Pattern(e.to_string()).into(),
            DetectorError::Config { field, reason } => {
                ConfigError::InvalidValue { field, reason }.into()
            }
            DetectorError::Io(e) => LoginwatchError::Io(e),
        }
    }
}
