#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`pattern`]: sshd 인증 로그 라인 분류 (로그인 1종, 로그아웃 3종)
//! - [`session`]: 열린 세션 테이블, 로그아웃 필드 보완
//! - [`dedup`]: 로그아웃 중복 억제 윈도우와 janitor 태스크
//! - [`processor`]: 라인 단위 처리 (분류 → 상관 → 억제 → 발행)
//! - [`tailer`]: `tail -c +<offset> -F` 프로세스 실행과 읽기 루프
//! - [`logpath`]: 배포판별 인증 로그 경로 결정
//! - [`server`]: 서버 식별 정보 조회와 주기적 갱신
//! - [`detector`]: 전체 생명주기 (Pipeline trait 구현)
//! - [`config`]: 탐지기 설정 (core 설정 변환)
//! - [`error`]: 도메인 에러 타입

pub mod config;
pub mod dedup;
pub mod detector;
pub mod error;
pub mod logpath;
pub mod pattern;
pub mod processor;
pub mod server;
pub mod session;
pub mod tailer;

// --- 주요 타입 re-export ---

// 탐지기
pub use detector::{DetectorState, SessionDetector, SessionDetectorBuilder};

// 설정
pub use config::DetectorSettings;

// 에러
pub use error::DetectorError;

// 서버 정보
pub use server::{ServerInfoHandle, ServerInfoProvider, ServerMonitor, SystemServerInfo};

// 라인 처리
pub use dedup::DedupWindow;
pub use pattern::{AuthPatterns, LineMatch, LogoutFields};
pub use processor::{DetectorStats, DetectorStatsSnapshot, LineOutcome, LineProcessor};
pub use session::{SessionKey, SessionTable};

// 로그 경로
pub use logpath::{LogPathResolver, OsFamily, OsRelease};
