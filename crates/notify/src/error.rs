//! 알림 에러 타입
//!
//! [`NotifierError`]는 알림 채널 생성과 전송 중 발생하는 에러를 표현합니다.
//! `From<NotifierError> for LoginwatchError` 변환이 구현되어 있습니다.

use loginwatch_core::error::{LoginwatchError, NotifyError};

/// 알림 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    /// 설정 누락 또는 잘못된 값
    #[error("{name}: invalid config '{field}': {reason}")]
    Config {
        /// 알림 채널 이름
        name: &'static str,
        /// 설정 필드명
        field: &'static str,
        /// 에러 사유
        reason: String,
    },

    /// 요청 전송 실패 (연결, 타임아웃 등)
    #[error("{name}: request failed: {reason}")]
    Request {
        /// 알림 채널 이름
        name: &'static str,
        /// 실패 사유
        reason: String,
    },

    /// 2xx가 아닌 HTTP 응답
    #[error("{name}: unexpected http status {status}: {body}")]
    Status {
        /// 알림 채널 이름
        name: &'static str,
        /// HTTP 상태 코드
        status: u16,
        /// 응답 본문 (앞부분만)
        body: String,
    },

    /// HTTP는 성공했지만 API가 거부함
    #[error("{name}: rejected by api (code {code}): {message}")]
    Rejected {
        /// 알림 채널 이름
        name: &'static str,
        /// API 에러 코드
        code: i64,
        /// API 에러 메시지
        message: String,
    },
}

impl NotifierError {
    /// 에러가 발생한 알림 채널 이름
    pub fn notifier(&self) -> &'static str {
        match self {
            Self::Config { name, .. }
            | Self::Request { name, .. }
            | Self::Status { name, .. }
            | Self::Rejected { name, .. } => name,
        }
    }
}

impl From<NotifierError> for LoginwatchError {
    fn from(err: NotifierError) -> Self {
        let name = err.notifier().to_owned();
        let reason = err.to_string();
        match err {
            NotifierError::Config { .. } => NotifyError::Init { name, reason }.into(),
            _ => NotifyError::Send { name, reason }.into(),
        }
    }
}
