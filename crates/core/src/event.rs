//! 이벤트 시스템 -- 모듈 간 통신의 기본 단위
//!
//! 탐지기가 생성한 [`SessionEvent`]는 [`EventBus`](crate::bus::EventBus)를 통해
//! 알림 모듈로 전달됩니다. [`EventMetadata`]는 모든 이벤트에 공통으로 포함되는
//! 메타데이터이며, [`Event`] trait은 모든 이벤트 타입이 구현해야 하는 인터페이스입니다.

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::types::{ServerInfo, SessionEventKind};

// --- 모듈명 상수 ---

/// 세션 탐지기 모듈명
pub const MODULE_SESSION_DETECTOR: &str = "session-detector";
/// 서버 모니터 모듈명
pub const MODULE_SERVER_MONITOR: &str = "server-monitor";
/// 알림 모듈명
pub const MODULE_NOTIFY: &str = "notify";

// --- 이벤트 타입 상수 ---

/// 로그인 이벤트 타입
pub const EVENT_TYPE_LOGIN: &str = "login";
/// 로그아웃 이벤트 타입
pub const EVENT_TYPE_LOGOUT: &str = "logout";

/// 이벤트 메타데이터 -- 모든 이벤트에 공통으로 포함되는 추적 정보
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// 이벤트 발생 시각
    pub timestamp: SystemTime,
    /// 이벤트를 생성한 모듈명
    pub source_module: String,
    /// 추적 ID
    pub trace_id: String,
}

impl EventMetadata {
    /// 기존 trace_id를 사용하여 새 메타데이터를 생성합니다.
    pub fn new(source_module: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            source_module: source_module.into(),
            trace_id: trace_id.into(),
        }
    }

    /// 새로운 UUID v4 trace_id를 생성하여 메타데이터를 만듭니다.
    pub fn with_new_trace(source_module: impl Into<String>) -> Self {
        Self::new(source_module, uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for EventMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] source={} trace={}",
            unix_timestamp_str(self.timestamp),
            self.source_module,
            self.trace_id,
        )
    }
}

/// 모든 이벤트가 구현해야 하는 기본 trait
///
/// `Send + Sync + 'static` 바운드로 `tokio::mpsc` 채널을 통한
/// 안전한 전송을 보장합니다.
pub trait Event: Send + Sync + 'static {
    /// 이벤트 고유 ID (UUID v4)
    fn event_id(&self) -> &str;

    /// 이벤트 메타데이터 (timestamp, source_module, trace_id)
    fn metadata(&self) -> &EventMetadata;

    /// 이벤트 타입명 (로깅 및 라우팅에 사용)
    fn event_type(&self) -> &str;
}

/// SSH 로그인/로그아웃 이벤트
///
/// 생성 후에는 변경되지 않습니다. 버스에서는 [`SharedSessionEvent`]로 감싸서
/// 모든 구독자가 같은 인스턴스를 공유합니다.
///
/// `username`, `ip`, `port`는 로그에서 추출했거나 세션 테이블에서 보완한 값이며,
/// 둘 다 실패하면 [`UNKNOWN_USER`](crate::types::UNKNOWN_USER) 등의 센티널이 들어갑니다.
#[derive(Debug, Clone, Serialize)]
pub struct SessionEvent {
    /// 이벤트 고유 ID
    pub id: String,
    /// 이벤트 메타데이터 (timestamp가 이벤트 발생 시각)
    pub metadata: EventMetadata,
    /// 로그인 / 로그아웃
    pub kind: SessionEventKind,
    /// 사용자명
    pub username: String,
    /// 출발지 IP
    pub ip: String,
    /// 출발지 포트
    pub port: String,
    /// 발행 시점의 서버 정보 스냅샷
    pub server_info: Arc<ServerInfo>,
}

/// 버스에서 전달되는 공유 이벤트
pub type SharedSessionEvent = Arc<SessionEvent>;

impl SessionEvent {
    /// 로그인 이벤트를 생성합니다.
    pub fn login(
        username: impl Into<String>,
        ip: impl Into<String>,
        port: impl Into<String>,
        server_info: Arc<ServerInfo>,
    ) -> Self {
        Self::new(SessionEventKind::Login, username, ip, port, server_info)
    }

    /// 로그아웃 이벤트를 생성합니다.
    pub fn logout(
        username: impl Into<String>,
        ip: impl Into<String>,
        port: impl Into<String>,
        server_info: Arc<ServerInfo>,
    ) -> Self {
        Self::new(SessionEventKind::Logout, username, ip, port, server_info)
    }

    fn new(
        kind: SessionEventKind,
        username: impl Into<String>,
        ip: impl Into<String>,
        port: impl Into<String>,
        server_info: Arc<ServerInfo>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata: EventMetadata::with_new_trace(MODULE_SESSION_DETECTOR),
            kind,
            username: username.into(),
            ip: ip.into(),
            port: port.into(),
            server_info,
        }
    }

    /// 이벤트 발생 시각
    pub fn timestamp(&self) -> SystemTime {
        self.metadata.timestamp
    }
}

impl Event for SessionEvent {
    fn event_id(&self) -> &str {
        &self.id
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn event_type(&self) -> &str {
        match self.kind {
            SessionEventKind::Login => EVENT_TYPE_LOGIN,
            SessionEventKind::Logout => EVENT_TYPE_LOGOUT,
        }
    }
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SessionEvent[{}] {} user={} from={}:{} host={}",
            &self.id[..8.min(self.id.len())],
            self.kind,
            self.username,
            self.ip,
            self.port,
            self.server_info.hostname,
        )
    }
}

fn unix_timestamp_str(time: SystemTime) -> String {
    match time.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(duration) => format!("{}", duration.as_secs()),
        Err(_) => "unknown".to_owned(),
    }
}
