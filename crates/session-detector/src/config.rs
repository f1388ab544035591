//! 탐지기 설정
//!
//! [`DetectorSettings`]는 core의 [`DetectorConfig`](loginwatch_core::config::DetectorConfig)를
//! 탐지기 내부에서 쓰기 좋은 타입(`PathBuf`, `Duration`)으로 변환한 설정입니다.
//!
//! # 사용 예시
//! ```ignore
//! use loginwatch_core::config::LoginwatchConfig;
//! use loginwatch_session_detector::config::DetectorSettings;
//!
//! let core_config = LoginwatchConfig::default();
//! let settings = DetectorSettings::from_core(&core_config.detector);
//! ```

use std::path::{Component, PathBuf};
use std::time::Duration;

use loginwatch_core::config::DetectorConfig;

use crate::error::DetectorError;

/// 세션 탐지기 설정
#[derive(Debug, Clone)]
pub struct DetectorSettings {
    /// 명시적 로그 파일 경로 (`None`이면 자동 결정)
    pub log_file: Option<PathBuf>,
    /// 파일 추적 명령
    pub tail_command: String,
    /// 로그아웃 중복 억제 윈도우
    pub dedup_window: Duration,
    /// 만료된 중복 기록 정리 주기
    pub dedup_sweep_interval: Duration,
    /// 정지 시 읽기 루프 종료 대기 시간
    pub stop_timeout: Duration,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self::from_core(&DetectorConfig::default())
    }
}

impl DetectorSettings {
    /// core 설정에서 탐지기 설정을 생성합니다.
    pub fn from_core(core: &DetectorConfig) -> Self {
        let log_file = if core.log_file.trim().is_empty() {
            None
        } else {
            Some(PathBuf::from(&core.log_file))
        };

        Self {
            log_file,
            tail_command: core.tail_command.clone(),
            dedup_window: Duration::from_secs(core.dedup_window_secs),
            dedup_sweep_interval: Duration::from_millis(core.dedup_sweep_interval_ms),
            stop_timeout: Duration::from_secs(core.stop_timeout_secs),
        }
    }

    /// 명시적 로그 파일 경로를 지정합니다.
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    /// 설정값을 검증합니다.
    pub fn validate(&self) -> Result<(), DetectorError> {
        if let Some(path) = &self.log_file
            && (!path.is_absolute() || path.components().any(|c| c == Component::ParentDir))
        {
            return Err(DetectorError::Config {
                field: "log_file".to_owned(),
                reason: format!(
                    "must be an absolute path without '..': {}",
                    path.display()
                ),
            });
        }

        if self.tail_command.trim().is_empty() {
            return Err(DetectorError::Config {
                field: "tail_command".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.dedup_window.is_zero() {
            return Err(DetectorError::Config {
                field: "dedup_window".to_owned(),
                reason: "must be greater than zero".to_owned(),
            });
        }

        if self.dedup_sweep_interval.is_zero() {
            return Err(DetectorError::Config {
                field: "dedup_sweep_interval".to_owned(),
                reason: "must be greater than zero".to_owned(),
            });
        }

        if self.stop_timeout.is_zero() {
            return Err(DetectorError::Config {
                field: "stop_timeout".to_owned(),
                reason: "must be greater than zero".to_owned(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_core_defaults() {
        let settings = DetectorSettings::default();
        assert!(settings.log_file.is_none());
        assert_eq!(settings.tail_command, "tail");
        assert_eq!(settings.dedup_window, Duration::from_secs(5));
        assert_eq!(settings.dedup_sweep_interval, Duration::from_millis(1000));
        settings.validate().unwrap();
    }

    #[test]
    fn from_core_with_explicit_log_file() {
        let core = DetectorConfig {
            log_file: "/var/log/secure".to_owned(),
            ..DetectorConfig::default()
        };
        let settings = DetectorSettings::from_core(&core);
        assert_eq!(settings.log_file, Some(PathBuf::from("/var/log/secure")));
    }

    #[test]
    fn whitespace_log_file_means_auto() {
        let core = DetectorConfig {
            log_file: "   ".to_owned(),
            ..DetectorConfig::default()
        };
        assert!(DetectorSettings::from_core(&core).log_file.is_none());
    }

    #[test]
    fn validate_rejects_relative_path() {
        let settings = DetectorSettings::default().with_log_file("auth.log");
        assert!(settings.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_window() {
        let settings = DetectorSettings {
            dedup_window: Duration::ZERO,
            ..DetectorSettings::default()
        };
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("dedup_window"));
    }
}
