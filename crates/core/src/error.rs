//! 에러 타입 -- 도메인별 에러 정의

/// Loginwatch 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LoginwatchError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인(생명주기) 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 탐지기 에러
    #[error("detection error: {0}")]
    Detection(#[from] DetectionError),

    /// 알림 전송 에러
    #[error("notify error: {0}")]
    Notify(#[from] NotifyError),

    /// 시스템 자원 샘플링 에러
    #[error("system monitor error: {0}")]
    System(#[from] SystemError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 생명주기 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// 채널 수신 실패
    #[error("channel receive failed: {0}")]
    ChannelRecv(String),

    /// 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 이미 실행 중인 모듈을 다시 시작하려 함
    #[error("pipeline is already running")]
    AlreadyRunning,

    /// 실행 중이 아닌 모듈을 정지하려 함
    #[error("pipeline is not running")]
    NotRunning,
}

/// 탐지기 에러
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    /// 감시 대상 로그 파일 문제 (없음, 읽기 불가, 경로 결정 실패)
    #[error("log source error: {0}")]
    LogSource(String),

    /// 서버 식별 정보 결정 실패
    #[error("server identity error: {0}")]
    ServerIdentity(String),

    /// 패턴 컴파일 실패
    #[error("pattern error: {0}")]
    Pattern(String),

    /// tail 프로세스 / 읽기 스트림 실패
    #[error("tailer error: {0}")]
    Tailer(String),
}

/// 알림 전송 에러
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// 알림 채널 생성 실패
    #[error("notifier '{name}' init failed: {reason}")]
    Init { name: String, reason: String },

    /// 전송 실패
    #[error("notifier '{name}' send failed: {reason}")]
    Send { name: String, reason: String },
}

/// 시스템 자원 샘플링 에러
#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    /// 샘플 수집 실패
    #[error("sampling failed: {0}")]
    Sample(String),
}
