//! 인증 로그 패턴 매처
//!
//! OpenSSH가 남기는 인증 로그 라인을 로그인/로그아웃으로 분류합니다.
//!
//! # 지원 형식
//! ```text
//! 로그인
//!   sshd[100]: Accepted password for alice from 10.0.0.5 port 4422 ssh2
//!   sshd[100]: Accepted publickey for alice from 10.0.0.5 port 4422 ssh2
//!
//! 로그아웃 (이 순서로 시도, 먼저 매칭된 패턴 사용)
//!   1. sshd[101]: Received disconnect from 10.0.0.5 port 4422:11: disconnected by user   -> (ip, port)
//!   2. sshd[101]: Disconnected from user alice 10.0.0.5 port 4422                         -> (user, ip, port)
//!   3. sshd[101]: pam_unix(sshd:session): session closed for user alice                   -> (user)
//! ```
//!
//! OpenSSH 9.8 이후의 `sshd-session[pid]` 접두어도 허용합니다.
//! keyboard-interactive 등 다른 인증 방식은 의도적으로 제외합니다.

use regex::{Captures, Regex};

use crate::error::DetectorError;

/// sshd 프로세스 접두어
const SSHD_PREFIX: &str = r"sshd(?:-session)?\[\d+\]: ";
/// IPv4 리터럴
const IPV4: &str = r"(\d{1,3}(?:\.\d{1,3}){3})";

/// 로그아웃 라인에서 추출한 (부분) 식별 정보
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutFields {
    /// 패턴 1: 주소만 있음
    Addr {
        /// 출발지 IP
        ip: String,
        /// 출발지 포트
        port: String,
    },
    /// 패턴 2: 세 필드 모두 있음
    Full {
        /// 사용자명
        username: String,
        /// 출발지 IP
        ip: String,
        /// 출발지 포트
        port: String,
    },
    /// 패턴 3: 사용자명만 있음
    User {
        /// 사용자명
        username: String,
    },
}

/// 라인 분류 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineMatch {
    /// 로그인 라인
    Login {
        /// 사용자명
        username: String,
        /// 출발지 IP
        ip: String,
        /// 출발지 포트
        port: String,
    },
    /// 로그아웃 라인
    Logout(LogoutFields),
}

/// 컴파일된 인증 로그 패턴 집합
///
/// 생성 비용이 있으므로 탐지기 시작 시 한 번만 만듭니다.
#[derive(Debug, Clone)]
pub struct AuthPatterns {
    login: Regex,
    disconnect_received: Regex,
    disconnected_user: Regex,
    session_closed: Regex,
}

impl AuthPatterns {
    /// 모든 패턴을 컴파일합니다.
    pub fn new() -> Result<Self, DetectorError> {
        Ok(Self {
            login: Regex::new(&format!(
                r"{SSHD_PREFIX}Accepted (?:password|publickey) for (\w+) from {IPV4} port (\d+)"
            ))?,
            disconnect_received: Regex::new(&format!(
                r"{SSHD_PREFIX}Received disconnect from {IPV4} port (\d+):11: (?i:disconnected by user)"
            ))?,
            disconnected_user: Regex::new(&format!(
                r"{SSHD_PREFIX}Disconnected from user (\w+) {IPV4} port (\d+)"
            ))?,
            session_closed: Regex::new(&format!(
                r"{SSHD_PREFIX}pam_unix\(sshd:session\): session closed for user (\w+)"
            ))?,
        })
    }

    /// 라인을 분류합니다.
    ///
    /// 로그인 패턴을 먼저 시도하고, 이후 로그아웃 패턴을 고정된 순서로 시도합니다.
    /// 매칭되었지만 캡처 그룹이 비어 있으면 `None`을 반환합니다.
    pub fn classify(&self, line: &str) -> Option<LineMatch> {
        if let Some(caps) = self.login.captures(line) {
            let (username, ip, port) = (group(&caps, 1)?, group(&caps, 2)?, group(&caps, 3)?);
            return Some(LineMatch::Login { username, ip, port });
        }

        if let Some(caps) = self.disconnect_received.captures(line) {
            let (ip, port) = (group(&caps, 1)?, group(&caps, 2)?);
            return Some(LineMatch::Logout(LogoutFields::Addr { ip, port }));
        }

        if let Some(caps) = self.disconnected_user.captures(line) {
            let (username, ip, port) = (group(&caps, 1)?, group(&caps, 2)?, group(&caps, 3)?);
            return Some(LineMatch::Logout(LogoutFields::Full { username, ip, port }));
        }

        if let Some(caps) = self.session_closed.captures(line) {
            let username = group(&caps, 1)?;
            return Some(LineMatch::Logout(LogoutFields::User { username }));
        }

        None
    }
}

fn group(caps: &Captures<'_>, index: usize) -> Option<String> {
    caps.get(index)
        .map(|m| m.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns() -> AuthPatterns {
        AuthPatterns::new().unwrap()
    }

    #[test]
    fn login_password() {
        let m = patterns().classify(
            "Mar  1 10:00:00 web sshd[100]: Accepted password for alice from 10.0.0.5 port 4422 ssh2",
        );
        assert_eq!(
            m,
            Some(LineMatch::Login {
                username: "alice".to_owned(),
                ip: "10.0.0.5".to_owned(),
                port: "4422".to_owned(),
            })
        );
    }

    #[test]
    fn login_publickey() {
        let m = patterns()
            .classify("sshd[7]: Accepted publickey for deploy from 192.168.1.20 port 50022 ssh2: RSA SHA256:abc");
        assert!(matches!(m, Some(LineMatch::Login { ref username, .. }) if username == "deploy"));
    }

    #[test]
    fn keyboard_interactive_is_ignored() {
        let m = patterns().classify(
            "sshd[7]: Accepted keyboard-interactive/pam for alice from 10.0.0.5 port 4422 ssh2",
        );
        assert_eq!(m, None);
    }

    #[test]
    fn line_without_sshd_prefix_is_ignored() {
        let m = patterns().classify("Accepted password for alice from 10.0.0.5 port 4422 ssh2");
        assert_eq!(m, None);
    }

    #[test]
    fn sshd_session_prefix_is_accepted() {
        let m = patterns().classify(
            "sshd-session[2201]: Disconnected from user alice 10.0.0.5 port 4422",
        );
        assert!(matches!(m, Some(LineMatch::Logout(LogoutFields::Full { .. }))));
    }

    #[test]
    fn logout_received_disconnect() {
        let m = patterns().classify(
            "sshd[101]: Received disconnect from 10.0.0.5 port 4422:11: disconnected by user",
        );
        assert_eq!(
            m,
            Some(LineMatch::Logout(LogoutFields::Addr {
                ip: "10.0.0.5".to_owned(),
                port: "4422".to_owned(),
            }))
        );
    }

    #[test]
    fn logout_received_disconnect_capitalized_reason() {
        let m = patterns().classify(
            "sshd[101]: Received disconnect from 10.0.0.5 port 4422:11: Disconnected by user",
        );
        assert!(matches!(m, Some(LineMatch::Logout(LogoutFields::Addr { .. }))));
    }

    #[test]
    fn received_disconnect_with_other_reason_is_ignored() {
        let m = patterns().classify(
            "sshd[101]: Received disconnect from 10.0.0.5 port 4422:11: Bye Bye [preauth]",
        );
        assert_eq!(m, None);
    }

    #[test]
    fn logout_disconnected_from_user() {
        let m = patterns().classify("sshd[101]: Disconnected from user alice 10.0.0.5 port 4422");
        assert_eq!(
            m,
            Some(LineMatch::Logout(LogoutFields::Full {
                username: "alice".to_owned(),
                ip: "10.0.0.5".to_owned(),
                port: "4422".to_owned(),
            }))
        );
    }

    #[test]
    fn logout_session_closed() {
        let m = patterns().classify("sshd[102]: pam_unix(sshd:session): session closed for user bob");
        assert_eq!(
            m,
            Some(LineMatch::Logout(LogoutFields::User {
                username: "bob".to_owned()
            }))
        );
    }

    #[test]
    fn session_opened_is_ignored() {
        let m = patterns().classify(
            "sshd[102]: pam_unix(sshd:session): session opened for user bob(uid=1000) by (uid=0)",
        );
        assert_eq!(m, None);
    }

    #[test]
    fn first_matching_logout_pattern_wins() {
        // 패턴 1과 3이 모두 포함된 비정상 라인
        let line = "sshd[1]: Received disconnect from 10.0.0.5 port 4422:11: disconnected by user \
                    sshd[1]: pam_unix(sshd:session): session closed for user bob";
        assert!(matches!(
            patterns().classify(line),
            Some(LineMatch::Logout(LogoutFields::Addr { .. }))
        ));
    }

    #[test]
    fn unrelated_lines_are_ignored() {
        let p = patterns();
        for line in [
            "",
            "CRON[200]: pam_unix(cron:session): session closed for user root",
            "sshd[5]: Failed password for invalid user admin from 1.2.3.4 port 22 ssh2",
            "sshd[5]: Connection closed by 1.2.3.4 port 22 [preauth]",
        ] {
            assert_eq!(p.classify(line), None, "{line}");
        }
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn login_extracts_exact_fields(
                user in "[a-z_][a-z0-9_]{0,15}",
                a in 0u8..=255, b in 0u8..=255, c in 0u8..=255, d in 0u8..=255,
                port in 1u16..=65535,
                pid in 1u32..=4_000_000,
                method in prop::sample::select(vec!["password", "publickey"]),
            ) {
                let ip = format!("{a}.{b}.{c}.{d}");
                let line = format!("sshd[{pid}]: Accepted {method} for {user} from {ip} port {port} ssh2");
                let m = AuthPatterns::new().unwrap().classify(&line);
                prop_assert_eq!(m, Some(LineMatch::Login {
                    username: user,
                    ip,
                    port: port.to_string(),
                }));
            }

            #[test]
            fn disconnected_from_user_extracts_exact_fields(
                user in "[a-z][a-z0-9_]{0,15}",
                a in 0u8..=255, d in 0u8..=255,
                port in 1u16..=65535,
            ) {
                let ip = format!("{a}.0.0.{d}");
                let line = format!("sshd[9]: Disconnected from user {user} {ip} port {port}");
                let m = AuthPatterns::new().unwrap().classify(&line);
                prop_assert_eq!(m, Some(LineMatch::Logout(LogoutFields::Full {
                    username: user,
                    ip,
                    port: port.to_string(),
                })));
            }

            #[test]
            fn classify_never_panics(line in ".{0,200}") {
                let _ = AuthPatterns::new().unwrap().classify(&line);
            }
        }
    }
}
