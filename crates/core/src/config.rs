//! 설정 관리 -- loginwatch.toml 파싱 및 런타임 설정
//!
//! [`LoginwatchConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`LOGINWATCH_DETECTOR_LOG_FILE=/var/log/auth.log` 형식)
//! 3. 설정 파일 (`loginwatch.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), loginwatch_core::error::LoginwatchError> {
//! use loginwatch_core::config::LoginwatchConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = LoginwatchConfig::load("loginwatch.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = LoginwatchConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LoginwatchError};

/// Loginwatch 통합 설정
///
/// `loginwatch.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 모듈은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginwatchConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 세션 탐지기 설정
    #[serde(default)]
    pub detector: DetectorConfig,
    /// 서버 정보 모니터 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 하트비트 설정
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// 알림 채널 설정
    #[serde(default)]
    pub notify: NotifyConfig,
    /// 시스템 자원 샘플링 설정
    #[serde(default)]
    pub system: SystemConfig,
}

impl LoginwatchConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LoginwatchError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LoginwatchError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LoginwatchError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LoginwatchError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LoginwatchError> {
        toml::from_str(toml_str).map_err(|e| {
            LoginwatchError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGINWATCH_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOGINWATCH_GENERAL_LOG_LEVEL");
        override_string(
            &mut self.general.log_format,
            "LOGINWATCH_GENERAL_LOG_FORMAT",
        );
        override_string(&mut self.general.pid_file, "LOGINWATCH_GENERAL_PID_FILE");

        // Detector
        override_string(&mut self.detector.log_file, "LOGINWATCH_DETECTOR_LOG_FILE");
        override_string(
            &mut self.detector.tail_command,
            "LOGINWATCH_DETECTOR_TAIL_COMMAND",
        );
        override_u64(
            &mut self.detector.dedup_window_secs,
            "LOGINWATCH_DETECTOR_DEDUP_WINDOW_SECS",
        );
        override_u64(
            &mut self.detector.dedup_sweep_interval_ms,
            "LOGINWATCH_DETECTOR_DEDUP_SWEEP_INTERVAL_MS",
        );
        override_usize(
            &mut self.detector.bus_capacity,
            "LOGINWATCH_DETECTOR_BUS_CAPACITY",
        );
        override_u64(
            &mut self.detector.stop_timeout_secs,
            "LOGINWATCH_DETECTOR_STOP_TIMEOUT_SECS",
        );

        // Server
        override_u64(
            &mut self.server.refresh_interval_secs,
            "LOGINWATCH_SERVER_REFRESH_INTERVAL_SECS",
        );

        // Heartbeat
        override_bool(&mut self.heartbeat.enabled, "LOGINWATCH_HEARTBEAT_ENABLED");
        override_u64(
            &mut self.heartbeat.interval_secs,
            "LOGINWATCH_HEARTBEAT_INTERVAL_SECS",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "LOGINWATCH_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "LOGINWATCH_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "LOGINWATCH_METRICS_PORT");

        // Notify
        override_bool(
            &mut self.notify.feishu.enabled,
            "LOGINWATCH_NOTIFY_FEISHU_ENABLED",
        );
        override_string(
            &mut self.notify.feishu.webhook_url,
            "LOGINWATCH_NOTIFY_FEISHU_WEBHOOK_URL",
        );
        override_bool(
            &mut self.notify.dingtalk.enabled,
            "LOGINWATCH_NOTIFY_DINGTALK_ENABLED",
        );
        override_string(
            &mut self.notify.dingtalk.webhook_url,
            "LOGINWATCH_NOTIFY_DINGTALK_WEBHOOK_URL",
        );
        override_string(
            &mut self.notify.dingtalk.secret,
            "LOGINWATCH_NOTIFY_DINGTALK_SECRET",
        );
        override_bool(
            &mut self.notify.telegram.enabled,
            "LOGINWATCH_NOTIFY_TELEGRAM_ENABLED",
        );
        override_string(
            &mut self.notify.telegram.bot_token,
            "LOGINWATCH_NOTIFY_TELEGRAM_BOT_TOKEN",
        );
        override_string(
            &mut self.notify.telegram.chat_id,
            "LOGINWATCH_NOTIFY_TELEGRAM_CHAT_ID",
        );
        override_bool(
            &mut self.notify.email.enabled,
            "LOGINWATCH_NOTIFY_EMAIL_ENABLED",
        );
        override_string(&mut self.notify.email.host, "LOGINWATCH_NOTIFY_EMAIL_HOST");
        override_u16(&mut self.notify.email.port, "LOGINWATCH_NOTIFY_EMAIL_PORT");
        override_string(
            &mut self.notify.email.username,
            "LOGINWATCH_NOTIFY_EMAIL_USERNAME",
        );
        override_string(
            &mut self.notify.email.password,
            "LOGINWATCH_NOTIFY_EMAIL_PASSWORD",
        );

        // System monitor
        override_bool(&mut self.system.enabled, "LOGINWATCH_SYSTEM_ENABLED");
        override_u64(
            &mut self.system.interval_secs,
            "LOGINWATCH_SYSTEM_INTERVAL_SECS",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LoginwatchError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        self.detector.validate()?;

        if self.server.refresh_interval_secs == 0 {
            return Err(invalid(
                "server.refresh_interval_secs",
                "must be at least 1".to_owned(),
            ));
        }

        if self.heartbeat.enabled && self.heartbeat.interval_secs == 0 {
            return Err(invalid(
                "heartbeat.interval_secs",
                "must be at least 1 when heartbeat is enabled".to_owned(),
            ));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid("metrics.port", "must not be 0".to_owned()));
        }

        if self.system.enabled && self.system.interval_secs == 0 {
            return Err(invalid(
                "system.interval_secs",
                "must be at least 1 when the system monitor is enabled".to_owned(),
            ));
        }

        self.notify.validate()?;

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> LoginwatchError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// PID 파일 경로 (빈 문자열이면 생성하지 않음)
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            pid_file: "/var/run/loginwatch/loginwatch.pid".to_owned(),
        }
    }
}

/// 세션 탐지기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// 감시할 인증 로그 경로 (빈 문자열이면 배포판에 따라 자동 결정)
    pub log_file: String,
    /// 파일 추적에 사용할 외부 명령 (`<cmd> -c +<offset> -F <path>`)
    pub tail_command: String,
    /// 로그아웃 중복 억제 윈도우 (초)
    pub dedup_window_secs: u64,
    /// 만료된 중복 기록 정리 주기 (밀리초)
    pub dedup_sweep_interval_ms: u64,
    /// 이벤트 버스 구독자별 버퍼 크기
    pub bus_capacity: usize,
    /// 정지 시 읽기 루프 종료 대기 시간 (초)
    pub stop_timeout_secs: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            log_file: String::new(),
            tail_command: "tail".to_owned(),
            dedup_window_secs: 5,
            dedup_sweep_interval_ms: 1000,
            bus_capacity: 256,
            stop_timeout_secs: 5,
        }
    }
}

impl DetectorConfig {
    /// 탐지기 설정을 검증합니다.
    pub fn validate(&self) -> Result<(), LoginwatchError> {
        if !self.log_file.is_empty() {
            let path = Path::new(&self.log_file);
            if !path.is_absolute() {
                return Err(invalid(
                    "detector.log_file",
                    "must be an absolute path".to_owned(),
                ));
            }
            if path
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
            {
                return Err(invalid(
                    "detector.log_file",
                    "must not contain '..'".to_owned(),
                ));
            }
        }

        if self.tail_command.trim().is_empty() {
            return Err(invalid(
                "detector.tail_command",
                "must not be empty".to_owned(),
            ));
        }

        if self.dedup_window_secs == 0 {
            return Err(invalid(
                "detector.dedup_window_secs",
                "must be at least 1".to_owned(),
            ));
        }

        if self.dedup_sweep_interval_ms == 0 {
            return Err(invalid(
                "detector.dedup_sweep_interval_ms",
                "must be at least 1".to_owned(),
            ));
        }

        if self.bus_capacity == 0 {
            return Err(invalid(
                "detector.bus_capacity",
                "must be at least 1".to_owned(),
            ));
        }

        if self.stop_timeout_secs == 0 {
            return Err(invalid(
                "detector.stop_timeout_secs",
                "must be at least 1".to_owned(),
            ));
        }

        Ok(())
    }
}

/// 서버 정보 모니터 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 호스트명/IP/OS 재조회 주기 (초)
    pub refresh_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 60,
        }
    }
}

/// 하트비트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 가동 시간 로그 주기 (초)
    pub interval_secs: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60,
        }
    }
}

/// 시스템 자원 샘플링 설정
///
/// CPU, 메모리, 디스크, 네트워크, 프로세스, TCP 상태를 주기적으로 로그에 남깁니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 샘플링 주기 (초)
    pub interval_secs: u64,
    /// 사용량을 보고할 마운트 경로 (비어 있으면 전체)
    pub disk_paths: Vec<String>,
    /// CPU 사용률 상위 프로세스 보고 개수 (0이면 생략)
    pub top_processes: usize,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60,
            disk_paths: vec!["/".to_owned()],
            top_processes: 5,
        }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 수신 주소
    pub listen_addr: String,
    /// 수신 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9187,
            endpoint: "/metrics".to_owned(),
        }
    }
}

/// 알림 채널 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Feishu(Lark) 웹훅
    pub feishu: FeishuConfig,
    /// DingTalk 웹훅
    pub dingtalk: DingTalkConfig,
    /// Telegram 봇
    pub telegram: TelegramConfig,
    /// SMTP 메일
    pub email: EmailConfig,
}

impl NotifyConfig {
    /// 활성화된 알림 채널 수
    pub fn enabled_count(&self) -> usize {
        [
            self.feishu.enabled,
            self.dingtalk.enabled,
            self.telegram.enabled,
            self.email.enabled,
        ]
        .into_iter()
        .filter(|enabled| *enabled)
        .count()
    }

    /// 활성화된 채널의 필수 옵션을 검증합니다.
    pub fn validate(&self) -> Result<(), LoginwatchError> {
        if self.feishu.enabled {
            require("notify.feishu.webhook_url", &self.feishu.webhook_url)?;
            require_timeout("notify.feishu.timeout_secs", self.feishu.timeout_secs)?;
        }
        if self.dingtalk.enabled {
            require("notify.dingtalk.webhook_url", &self.dingtalk.webhook_url)?;
            require_timeout("notify.dingtalk.timeout_secs", self.dingtalk.timeout_secs)?;
        }
        if self.telegram.enabled {
            require("notify.telegram.bot_token", &self.telegram.bot_token)?;
            require("notify.telegram.chat_id", &self.telegram.chat_id)?;
            require("notify.telegram.api_base", &self.telegram.api_base)?;
            require_timeout("notify.telegram.timeout_secs", self.telegram.timeout_secs)?;
        }
        if self.email.enabled {
            self.email.validate()?;
        }
        Ok(())
    }
}

fn require(field: &str, value: &str) -> Result<(), LoginwatchError> {
    if value.trim().is_empty() {
        return Err(invalid(
            field,
            "required when the notifier is enabled".to_owned(),
        ));
    }
    Ok(())
}

fn require_timeout(field: &str, secs: u64) -> Result<(), LoginwatchError> {
    if secs == 0 {
        return Err(invalid(field, "must be at least 1".to_owned()));
    }
    Ok(())
}

/// Feishu 웹훅 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeishuConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 봇 웹훅 URL
    pub webhook_url: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for FeishuConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook_url: String::new(),
            timeout_secs: 3,
        }
    }
}

/// DingTalk 웹훅 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DingTalkConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 봇 웹훅 URL (`access_token` 쿼리 포함)
    pub webhook_url: String,
    /// 서명 시크릿 (빈 문자열이면 서명하지 않음)
    pub secret: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for DingTalkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook_url: String::new(),
            secret: String::new(),
            timeout_secs: 3,
        }
    }
}

/// Telegram 봇 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 봇 토큰
    pub bot_token: String,
    /// 대상 채팅 ID
    pub chat_id: String,
    /// Bot API 기본 URL
    pub api_base: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token: String::new(),
            chat_id: String::new(),
            api_base: "https://api.telegram.org".to_owned(),
            timeout_secs: 3,
        }
    }
}

/// SMTP 연결 보안 방식
pub const EMAIL_SECURITY_MODES: [&str; 3] = ["starttls", "tls", "none"];

/// SMTP 메일 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// SMTP 서버 호스트
    pub host: String,
    /// SMTP 서버 포트
    pub port: u16,
    /// 인증 사용자 (빈 문자열이면 인증하지 않음)
    pub username: String,
    /// 인증 비밀번호
    pub password: String,
    /// 보내는 주소
    pub from: String,
    /// 받는 주소 목록
    pub to: Vec<String>,
    /// 연결 보안 (`starttls`, `tls`, `none`)
    pub security: String,
    /// 전송 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: String::new(),
            port: 587,
            username: String::new(),
            password: String::new(),
            from: String::new(),
            to: Vec::new(),
            security: "starttls".to_owned(),
            timeout_secs: 3,
        }
    }
}

impl EmailConfig {
    /// 활성화된 메일 채널의 옵션을 검증합니다.
    pub fn validate(&self) -> Result<(), LoginwatchError> {
        require("notify.email.host", &self.host)?;
        require("notify.email.from", &self.from)?;
        if self.port == 0 {
            return Err(invalid("notify.email.port", "must not be 0".to_owned()));
        }
        if self.to.iter().all(|addr| addr.trim().is_empty()) {
            return Err(invalid(
                "notify.email.to",
                "at least one recipient is required".to_owned(),
            ));
        }
        if self.username.trim().is_empty() != self.password.is_empty() {
            return Err(invalid(
                "notify.email.password",
                "username and password must be set together".to_owned(),
            ));
        }
        if !EMAIL_SECURITY_MODES.contains(&self.security.as_str()) {
            return Err(invalid(
                "notify.email.security",
                format!("must be one of: {}", EMAIL_SECURITY_MODES.join(", ")),
            ));
        }
        require_timeout("notify.email.timeout_secs", self.timeout_secs)
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
