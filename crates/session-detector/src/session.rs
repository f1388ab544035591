//! 세션 테이블 -- 로그인 식별 정보를 보관하여 로그아웃 필드를 보완합니다.
//!
//! 로그아웃 라인은 IP/포트나 사용자명 중 일부만 담는 경우가 많습니다.
//! [`SessionTable`]은 로그인 시점의 `(username, ip, port)`를 기억해 두었다가
//! 부분 식별 정보로 나머지 필드를 찾아줍니다.
//!
//! # 동시성
//! 읽기 루프 태스크 하나만 소유하고 변경합니다 (`&mut self`).
//! 여러 태스크에서 라인을 병렬 처리하려면 이 테이블에 별도 락이 필요합니다.

use std::collections::HashMap;
use std::fmt;
use std::time::SystemTime;

/// 세션 식별 키 `(username, ip, port)`
///
/// 같은 사용자가 같은 IP/포트로 재접속하면 키가 재사용되지만,
/// 상관 윈도우 안에서는 충분히 고유합니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey {
    /// 사용자명
    pub username: String,
    /// 출발지 IP
    pub ip: String,
    /// 출발지 포트
    pub port: String,
}

impl SessionKey {
    /// 새 키를 생성합니다.
    pub fn new(
        username: impl Into<String>,
        ip: impl Into<String>,
        port: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            ip: ip.into(),
            port: port.into(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.username, self.ip, self.port)
    }
}

/// 로그인 기록
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    /// 세션 키
    pub key: SessionKey,
    /// 마지막 로그인 시각
    pub last_login: SystemTime,
}

/// 열린 세션 테이블
///
/// 로그아웃과 짝지어지지 않은 로그인은 만료되지 않고 남습니다.
/// 실제 세션 수에 비례하므로 허용되는 누수입니다.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: HashMap<SessionKey, SessionRecord>,
}

impl SessionTable {
    /// 빈 테이블을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 로그인을 기록합니다. 같은 키가 있으면 시각을 갱신합니다.
    pub fn record_login(&mut self, key: SessionKey, at: SystemTime) {
        self.sessions.insert(
            key.clone(),
            SessionRecord {
                key,
                last_login: at,
            },
        );
    }

    /// `(ip, port)`가 일치하는 세션을 찾습니다.
    ///
    /// 후보가 여러 개면 어느 것이 반환될지 정해져 있지 않습니다.
    pub fn find_by_addr(&self, ip: &str, port: &str) -> Option<&SessionRecord> {
        self.sessions
            .values()
            .find(|r| r.key.ip == ip && r.key.port == port)
    }

    /// 사용자명이 일치하는 세션을 찾습니다.
    ///
    /// 같은 사용자의 세션이 여러 개면 어느 것이 반환될지 정해져 있지 않습니다.
    pub fn find_by_user(&self, username: &str) -> Option<&SessionRecord> {
        self.sessions.values().find(|r| r.key.username == username)
    }

    /// 세션을 제거하고 기록을 반환합니다.
    pub fn remove(&mut self, key: &SessionKey) -> Option<SessionRecord> {
        self.sessions.remove(key)
    }

    /// 키 존재 여부
    pub fn contains(&self, key: &SessionKey) -> bool {
        self.sessions.contains_key(key)
    }

    /// 세션 수
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
