//! 파이프라인 trait -- 모듈 생명주기 정의
//!
//! 데몬이 관리하는 모든 모듈(서버 모니터, 세션 탐지기, 알림 관리자)은
//! [`Pipeline`]을 구현합니다.
//!
//! # 생명주기
//! ```text
//! Created → start() → Running → stop() → Stopped → start() → Running ...
//! ```
//!
//! 실행 중에 `start()`를 호출하면 [`PipelineError::AlreadyRunning`],
//! 실행 중이 아닐 때 `stop()`을 호출하면 [`PipelineError::NotRunning`]을
//! 반환해야 합니다. 이 규칙 덕분에 `stop()`을 두 번 호출해도 안전합니다.
//!
//! [`PipelineError::AlreadyRunning`]: crate::error::PipelineError::AlreadyRunning
//! [`PipelineError::NotRunning`]: crate::error::PipelineError::NotRunning

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::LoginwatchError;

/// `Send` 박싱 future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 모듈 건강 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 동작하지만 일부 기능 저하
    Degraded(String),
    /// 동작 불가
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 여부
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 동작 불가 여부
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}

/// 모듈 생명주기 trait
///
/// RPITIT를 사용하므로 `dyn Pipeline`은 불가합니다.
/// 동적 관리가 필요하면 [`DynPipeline`]을 사용합니다.
pub trait Pipeline: Send + Sync {
    /// 모듈을 시작합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), LoginwatchError>> + Send;

    /// 모듈을 정지합니다. 진행 중인 작업이 끝날 때까지 (제한 시간 내에서) 기다립니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), LoginwatchError>> + Send;

    /// 모듈의 건강 상태를 확인합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// dyn-compatible 파이프라인 trait
///
/// `BoxFuture`를 반환하여 `Vec<Box<dyn DynPipeline>>`으로
/// 모듈을 동적 관리할 수 있게 합니다.
pub trait DynPipeline: Send + Sync {
    /// 모듈을 시작합니다.
    fn start(&mut self) -> BoxFuture<'_, Result<(), LoginwatchError>>;

    /// 모듈을 정지합니다.
    fn stop(&mut self) -> BoxFuture<'_, Result<(), LoginwatchError>>;

    /// 모듈의 건강 상태를 확인합니다.
    fn health_check(&self) -> BoxFuture<'_, HealthStatus>;
}

/// Pipeline을 구현한 타입은 자동으로 DynPipeline도 구현됩니다.
impl<T: Pipeline> DynPipeline for T {
    fn start(&mut self) -> BoxFuture<'_, Result<(), LoginwatchError>> {
        Box::pin(Pipeline::start(self))
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<(), LoginwatchError>> {
        Box::pin(Pipeline::stop(self))
    }

    fn health_check(&self) -> BoxFuture<'_, HealthStatus> {
        Box::pin(Pipeline::health_check(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    struct Toggle {
        running: bool,
    }

    impl Pipeline for Toggle {
        async fn start(&mut self) -> Result<(), LoginwatchError> {
            if self.running {
                return Err(PipelineError::AlreadyRunning.into());
            }
            self.running = true;
            Ok(())
        }

        async fn stop(&mut self) -> Result<(), LoginwatchError> {
            if !self.running {
                return Err(PipelineError::NotRunning.into());
            }
            self.running = false;
            Ok(())
        }

        async fn health_check(&self) -> HealthStatus {
            if self.running {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy("stopped".to_owned())
            }
        }
    }

    #[tokio::test]
    async fn dyn_pipeline_delegates_to_pipeline() {
        let mut boxed: Box<dyn DynPipeline> = Box::new(Toggle { running: false });
        boxed.start().await.unwrap();
        assert!(boxed.health_check().await.is_healthy());

        assert!(boxed.start().await.is_err());

        boxed.stop().await.unwrap();
        assert!(boxed.health_check().await.is_unhealthy());
    }

    #[tokio::test]
    async fn double_stop_is_reported_not_panicking() {
        let mut p = Toggle { running: true };
        Pipeline::stop(&mut p).await.unwrap();
        let err = Pipeline::stop(&mut p).await.unwrap_err();
        assert!(matches!(
            err,
            LoginwatchError::Pipeline(PipelineError::NotRunning)
        ));
    }

    #[test]
    fn health_status_display() {
        assert_eq!(HealthStatus::Healthy.to_string(), "healthy");
        assert_eq!(
            HealthStatus::Degraded("slow".to_owned()).to_string(),
            "degraded: slow"
        );
        assert_eq!(
            HealthStatus::Unhealthy("down".to_owned()).to_string(),
            "unhealthy: down"
        );
    }
}
