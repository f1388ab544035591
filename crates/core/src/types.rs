//! 도메인 타입 -- 시스템 전역에서 사용되는 공통 타입
//!
//! 탐지기, 알림 모듈, 데몬이 공유하는 데이터 구조를 정의합니다.

use std::fmt;

use serde::{Deserialize, Serialize};

// --- 센티널 값 ---
//
// 로그아웃 라인에서 추출하지 못했고 세션 테이블에서도 찾지 못한 필드는
// 에러 대신 아래 문자열로 채워집니다.

/// 사용자명을 알 수 없을 때 사용하는 값
pub const UNKNOWN_USER: &str = "unknown user";
/// 출발지 IP를 알 수 없을 때 사용하는 값
pub const UNKNOWN_IP: &str = "unknown ip";
/// 출발지 포트를 알 수 없을 때 사용하는 값
pub const UNKNOWN_PORT: &str = "unknown port";
/// 서버 정보 필드를 알 수 없을 때 사용하는 값
pub const UNKNOWN: &str = "unknown";

/// 주어진 값이 센티널인지 확인합니다.
pub fn is_sentinel(value: &str) -> bool {
    matches!(value, UNKNOWN_USER | UNKNOWN_IP | UNKNOWN_PORT)
}

/// 서버 식별 정보
///
/// 모든 이벤트에 첨부되는 호스트 스냅샷입니다.
/// 서버 모니터가 주기적으로 갱신하며, 약간 오래된 값도 허용됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// 호스트명
    pub hostname: String,
    /// 루프백이 아닌 첫 번째 IPv4 주소
    pub ip: String,
    /// OS 이름 (예: "Ubuntu 22.04.4 LTS")
    pub os_type: String,
}

impl ServerInfo {
    /// 새 서버 정보를 생성합니다.
    pub fn new(
        hostname: impl Into<String>,
        ip: impl Into<String>,
        os_type: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            ip: ip.into(),
            os_type: os_type.into(),
        }
    }

    /// 모든 필드가 알 수 없음인 서버 정보
    pub fn unknown() -> Self {
        Self::new(UNKNOWN, UNKNOWN, UNKNOWN)
    }
}

impl fmt::Display for ServerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) os={}", self.hostname, self.ip, self.os_type)
    }
}

/// 세션 이벤트 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionEventKind {
    /// SSH 로그인
    Login,
    /// SSH 로그아웃
    Logout,
}

impl SessionEventKind {
    /// 소문자 이름 ("login", "logout")
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Logout => "logout",
        }
    }
}

impl fmt::Display for SessionEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
