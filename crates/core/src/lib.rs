#![doc = include_str!("../README.md")]

pub mod bus;
pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod pipeline;
pub mod types;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{
    ConfigError, DetectionError, LoginwatchError, NotifyError, PipelineError, SystemError,
};

// 설정
pub use config::LoginwatchConfig;

// 이벤트 / 버스
pub use bus::{EventBus, Subscription};
pub use event::{Event, EventMetadata, SessionEvent, SharedSessionEvent};

// 파이프라인 trait
pub use pipeline::{BoxFuture, DynPipeline, HealthStatus, Pipeline};

// 도메인 타입
pub use types::{ServerInfo, SessionEventKind, UNKNOWN_IP, UNKNOWN_PORT, UNKNOWN_USER};

/// 세션 이벤트 전용 버스
pub type SessionEventBus = EventBus<SharedSessionEvent>;
