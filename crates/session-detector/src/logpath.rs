//! 인증 로그 경로 결정
//!
//! 명시적 경로가 없으면 `/etc/os-release`로 배포판 계열을 판단하여
//! 기본 경로를 고릅니다.
//!
//! | 계열 | 경로 |
//! |------|------|
//! | Debian / Ubuntu | `/var/log/auth.log` |
//! | RHEL / CentOS / Fedora / Rocky / Alma / Amazon | `/var/log/secure` |
//! | SUSE / openSUSE | `/var/log/messages` |
//!
//! 계열을 알 수 없으면 위 경로를 순서대로 확인하여 처음 존재하는 파일을 사용합니다.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::DetectorError;

/// os-release 기본 위치
pub const OS_RELEASE_PATH: &str = "/etc/os-release";

const DEBIAN_AUTH_LOG: &str = "/var/log/auth.log";
const REDHAT_AUTH_LOG: &str = "/var/log/secure";
const SUSE_AUTH_LOG: &str = "/var/log/messages";

/// `/etc/os-release`에서 필요한 필드만 추린 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsRelease {
    /// `ID`
    pub id: String,
    /// `ID_LIKE` (공백 구분)
    pub id_like: Vec<String>,
    /// `PRETTY_NAME`
    pub pretty_name: Option<String>,
}

impl OsRelease {
    /// os-release 내용을 파싱합니다. 알 수 없는 키는 무시합니다.
    pub fn parse(content: &str) -> Self {
        let mut release = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = unquote(value.trim());
            match key.trim() {
                "ID" => release.id = value.to_ascii_lowercase(),
                "ID_LIKE" => {
                    release.id_like = value
                        .split_whitespace()
                        .map(str::to_ascii_lowercase)
                        .collect();
                }
                "PRETTY_NAME" if !value.is_empty() => release.pretty_name = Some(value.to_owned()),
                _ => {}
            }
        }
        release
    }

    /// 파일에서 읽습니다. 읽을 수 없으면 `None`.
    pub fn read(path: &Path) -> Option<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Some(Self::parse(&content)),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "os-release not readable");
                None
            }
        }
    }

    /// 배포판 계열
    pub fn family(&self) -> OsFamily {
        std::iter::once(self.id.as_str())
            .chain(self.id_like.iter().map(String::as_str))
            .map(OsFamily::from_id)
            .find(|f| *f != OsFamily::Unknown)
            .unwrap_or(OsFamily::Unknown)
    }

    /// 사람이 읽을 OS 이름 (`PRETTY_NAME`, 없으면 `ID`)
    pub fn display_name(&self) -> Option<String> {
        self.pretty_name
            .clone()
            .or_else(|| (!self.id.is_empty()).then(|| self.id.clone()))
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value)
}

/// 배포판 계열
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    /// Debian, Ubuntu 및 파생
    Debian,
    /// RHEL, CentOS, Fedora, Rocky, Alma, Amazon Linux
    RedHat,
    /// SUSE, openSUSE
    Suse,
    /// 알 수 없음
    Unknown,
}

impl OsFamily {
    fn from_id(id: &str) -> Self {
        match id {
            "debian" | "ubuntu" | "linuxmint" | "raspbian" | "kali" | "pop" => Self::Debian,
            "rhel" | "centos" | "fedora" | "rocky" | "almalinux" | "amzn" | "ol" => Self::RedHat,
            "suse" | "sles" | "opensuse" | "opensuse-leap" | "opensuse-tumbleweed" => Self::Suse,
            _ => Self::Unknown,
        }
    }

    /// 계열별 기본 인증 로그 경로
    pub fn default_auth_log(&self) -> Option<&'static str> {
        match self {
            Self::Debian => Some(DEBIAN_AUTH_LOG),
            Self::RedHat => Some(REDHAT_AUTH_LOG),
            Self::Suse => Some(SUSE_AUTH_LOG),
            Self::Unknown => None,
        }
    }
}

/// 인증 로그 경로 결정기
#[derive(Debug, Clone)]
pub struct LogPathResolver {
    os_release: PathBuf,
    candidates: Vec<PathBuf>,
}

impl Default for LogPathResolver {
    fn default() -> Self {
        Self {
            os_release: PathBuf::from(OS_RELEASE_PATH),
            candidates: [DEBIAN_AUTH_LOG, REDHAT_AUTH_LOG, SUSE_AUTH_LOG]
                .into_iter()
                .map(PathBuf::from)
                .collect(),
        }
    }
}

impl LogPathResolver {
    /// os-release 위치와 후보 경로를 지정하여 생성합니다.
    pub fn new(os_release: impl Into<PathBuf>, candidates: Vec<PathBuf>) -> Self {
        Self {
            os_release: os_release.into(),
            candidates,
        }
    }

    /// 감시할 로그 경로를 결정하고 읽기 가능한지 확인합니다.
    pub fn resolve(&self, explicit: Option<&Path>) -> Result<PathBuf, DetectorError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => self.auto_detect()?,
        };
        ensure_readable(&path)?;
        info!(path = %path.display(), "resolved auth log path");
        Ok(path)
    }

    fn auto_detect(&self) -> Result<PathBuf, DetectorError> {
        let family = OsRelease::read(&self.os_release)
            .map(|r| r.family())
            .unwrap_or(OsFamily::Unknown);
        debug!(?family, "detected os family");

        if let Some(path) = family.default_auth_log() {
            return Ok(PathBuf::from(path));
        }

        self.candidates
            .iter()
            .find(|p| p.is_file())
            .cloned()
            .ok_or_else(|| DetectorError::LogPathUnresolved {
                tried: self
                    .candidates
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

/// 파일이 존재하고 읽기 가능한지 확인합니다.
pub fn ensure_readable(path: &Path) -> Result<(), DetectorError> {
    if !path.is_file() {
        return Err(DetectorError::LogFile {
            path: path.display().to_string(),
            reason: "does not exist or is not a regular file".to_owned(),
        });
    }
    File::open(path).map_err(|e| DetectorError::LogFile {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(())
}
