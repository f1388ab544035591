//! 라인 처리기 -- 분류, 세션 상관, 중복 억제, 발행
//!
//! ```text
//! line ─▶ AuthPatterns::classify
//!           ├─ Login  ─▶ SessionTable::record_login ─▶ publish
//!           └─ Logout ─▶ 필드 보완 (SessionTable → DedupWindow 최근 기록 → 센티널)
//!                        ─▶ DedupWindow::check_and_record
//!                             ├─ 중복 ─▶ 억제
//!                             └─ 신규 ─▶ publish ─▶ SessionTable::remove
//! ```
//!
//! 세션 테이블에서 찾지 못한 로그아웃은 방금 발행된 로그아웃의 식별 정보로 한 번 더
//! 보완합니다. 같은 연결 종료가 "Disconnected from user"와 "session closed" 두 줄로
//! 기록될 때 두 번째 줄도 같은 키가 되어 억제됩니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime};

use serde::Serialize;
use tracing::{debug, info};

use loginwatch_core::SessionEventBus;
use loginwatch_core::event::{SessionEvent, SharedSessionEvent};
use loginwatch_core::metrics as m;
use loginwatch_core::types::{UNKNOWN_IP, UNKNOWN_PORT, UNKNOWN_USER, is_sentinel};

use crate::dedup::DedupWindow;
use crate::error::DetectorError;
use crate::pattern::{AuthPatterns, LineMatch, LogoutFields};
use crate::server::ServerInfoHandle;
use crate::session::{SessionKey, SessionTable};

/// 라인 처리 결과
#[derive(Debug, Clone)]
pub enum LineOutcome {
    /// 관심 없는 라인
    Ignored,
    /// 로그인 이벤트 발행
    Login(SharedSessionEvent),
    /// 로그아웃 이벤트 발행
    Logout(SharedSessionEvent),
    /// 윈도우 안의 중복 로그아웃이라 억제됨
    Suppressed(SessionKey),
}

impl LineOutcome {
    /// 발행된 이벤트 (있으면)
    pub fn event(&self) -> Option<&SharedSessionEvent> {
        match self {
            Self::Login(event) | Self::Logout(event) => Some(event),
            Self::Ignored | Self::Suppressed(_) => None,
        }
    }
}

/// 탐지기 누적 카운터
#[derive(Debug, Default)]
pub struct DetectorStats {
    lines: AtomicU64,
    logins: AtomicU64,
    logouts: AtomicU64,
    suppressed: AtomicU64,
    correlation_misses: AtomicU64,
}

/// [`DetectorStats`]의 한 시점 값
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DetectorStatsSnapshot {
    /// 읽은 라인 수
    pub lines: u64,
    /// 발행된 로그인 수
    pub logins: u64,
    /// 발행된 로그아웃 수
    pub logouts: u64,
    /// 억제된 로그아웃 수
    pub suppressed: u64,
    /// 센티널로 채워진 로그아웃 수
    pub correlation_misses: u64,
}

impl DetectorStats {
    /// 현재 값을 읽습니다.
    pub fn snapshot(&self) -> DetectorStatsSnapshot {
        DetectorStatsSnapshot {
            lines: self.lines.load(Ordering::Relaxed),
            logins: self.logins.load(Ordering::Relaxed),
            logouts: self.logouts.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            correlation_misses: self.correlation_misses.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// 인증 로그 라인 처리기
///
/// 읽기 루프 태스크 하나가 소유합니다. 세션 테이블은 이 처리기 안에만 있습니다.
pub struct LineProcessor {
    patterns: AuthPatterns,
    table: SessionTable,
    dedup: Arc<DedupWindow>,
    bus: SessionEventBus,
    server: ServerInfoHandle,
    stats: Arc<DetectorStats>,
}

impl LineProcessor {
    /// 새 처리기를 생성합니다.
    pub fn new(
        dedup: Arc<DedupWindow>,
        bus: SessionEventBus,
        server: ServerInfoHandle,
        stats: Arc<DetectorStats>,
    ) -> Result<Self, DetectorError> {
        Ok(Self {
            patterns: AuthPatterns::new()?,
            table: SessionTable::new(),
            dedup,
            bus,
            server,
            stats,
        })
    }

    /// 세션 테이블 (읽기 전용)
    pub fn sessions(&self) -> &SessionTable {
        &self.table
    }

    /// 누적 카운터
    pub fn stats(&self) -> &Arc<DetectorStats> {
        &self.stats
    }

    /// 현재 시각으로 라인을 처리합니다.
    pub fn process_line(&mut self, line: &str) -> LineOutcome {
        self.process_line_at(line, Instant::now(), SystemTime::now())
    }

    /// 주어진 시각으로 라인을 처리합니다.
    ///
    /// `now`는 중복 윈도우 판정에, `wall`은 세션 테이블의 로그인 시각에 쓰입니다.
    pub fn process_line_at(&mut self, line: &str, now: Instant, wall: SystemTime) -> LineOutcome {
        DetectorStats::bump(&self.stats.lines);
        metrics::counter!(m::DETECTOR_LINES_TOTAL).increment(1);

        match self.patterns.classify(line) {
            None => LineOutcome::Ignored,
            Some(LineMatch::Login { username, ip, port }) => self.on_login(username, ip, port, wall),
            Some(LineMatch::Logout(fields)) => self.on_logout(fields, now),
        }
    }

    fn on_login(
        &mut self,
        username: String,
        ip: String,
        port: String,
        wall: SystemTime,
    ) -> LineOutcome {
        let key = SessionKey::new(username, ip, port);
        self.table.record_login(key.clone(), wall);
        metrics::gauge!(m::DETECTOR_ACTIVE_SESSIONS).set(self.table.len() as f64);

        let event = Arc::new(SessionEvent::login(
            key.username,
            key.ip,
            key.port,
            self.server.current(),
        ));
        let delivered = self.bus.publish(Arc::clone(&event));
        info!(
            username = %event.username,
            ip = %event.ip,
            port = %event.port,
            delivered,
            "ssh login detected"
        );

        DetectorStats::bump(&self.stats.logins);
        metrics::counter!(m::DETECTOR_LOGINS_TOTAL).increment(1);
        LineOutcome::Login(event)
    }

    fn on_logout(&mut self, fields: LogoutFields, now: Instant) -> LineOutcome {
        let key = self.correlate(fields, now);

        if self.dedup.check_and_record(&key, now) {
            debug!(session = %key, "duplicate logout suppressed");
            DetectorStats::bump(&self.stats.suppressed);
            metrics::counter!(m::DETECTOR_DUPLICATES_SUPPRESSED_TOTAL).increment(1);
            return LineOutcome::Suppressed(key);
        }

        let event = Arc::new(SessionEvent::logout(
            key.username.clone(),
            key.ip.clone(),
            key.port.clone(),
            self.server.current(),
        ));
        let delivered = self.bus.publish(Arc::clone(&event));
        info!(
            username = %event.username,
            ip = %event.ip,
            port = %event.port,
            delivered,
            "ssh logout detected"
        );

        if !has_sentinel(&key) {
            self.table.remove(&key);
            metrics::gauge!(m::DETECTOR_ACTIVE_SESSIONS).set(self.table.len() as f64);
        }

        DetectorStats::bump(&self.stats.logouts);
        metrics::counter!(m::DETECTOR_LOGOUTS_TOTAL).increment(1);
        LineOutcome::Logout(event)
    }

    /// 부분 식별 정보를 완전한 키로 보완합니다.
    fn correlate(&self, fields: LogoutFields, now: Instant) -> SessionKey {
        match fields {
            LogoutFields::Full { username, ip, port } => SessionKey::new(username, ip, port),
            LogoutFields::Addr { ip, port } => {
                let username = self
                    .table
                    .find_by_addr(&ip, &port)
                    .map(|r| r.key.username.clone())
                    .or_else(|| {
                        self.dedup
                            .find_recent_by_addr(&ip, &port, now)
                            .map(|k| k.username)
                    });
                match username {
                    Some(username) => SessionKey::new(username, ip, port),
                    None => {
                        self.miss(&format!("{ip}:{port}"));
                        SessionKey::new(UNKNOWN_USER, ip, port)
                    }
                }
            }
            LogoutFields::User { username } => {
                let addr = self
                    .table
                    .find_by_user(&username)
                    .map(|r| (r.key.ip.clone(), r.key.port.clone()))
                    .or_else(|| {
                        self.dedup
                            .find_recent_by_user(&username, now)
                            .map(|k| (k.ip, k.port))
                    });
                match addr {
                    Some((ip, port)) => SessionKey::new(username, ip, port),
                    None => {
                        self.miss(&username);
                        SessionKey::new(username, UNKNOWN_IP, UNKNOWN_PORT)
                    }
                }
            }
        }
    }

    fn miss(&self, partial: &str) {
        debug!(partial, "no open session for logout, using placeholders");
        DetectorStats::bump(&self.stats.correlation_misses);
        metrics::counter!(m::DETECTOR_CORRELATION_MISSES_TOTAL).increment(1);
    }
}

fn has_sentinel(key: &SessionKey) -> bool {
    is_sentinel(&key.username) || is_sentinel(&key.ip) || is_sentinel(&key.port)
}
