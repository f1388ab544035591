//! 알림 채널 trait
//!
//! [`Notifier`]는 `dyn Notifier`로 관리할 수 있도록 [`BoxFuture`]를 반환합니다.
//! 관리자는 채널 목록을 `Vec<Arc<dyn Notifier>>`로 보관하고 이벤트마다
//! 채널별 태스크를 띄웁니다.

use loginwatch_core::event::SessionEvent;
use loginwatch_core::pipeline::BoxFuture;
use loginwatch_core::types::SessionEventKind;

use crate::error::NotifierError;

/// 알림 채널
pub trait Notifier: Send + Sync {
    /// 채널 이름 (로그와 메트릭 레이블에 사용)
    fn name(&self) -> &'static str;

    /// 로그인 알림을 전송합니다.
    fn send_login<'a>(
        &'a self,
        event: &'a SessionEvent,
    ) -> BoxFuture<'a, Result<(), NotifierError>>;

    /// 로그아웃 알림을 전송합니다.
    fn send_logout<'a>(
        &'a self,
        event: &'a SessionEvent,
    ) -> BoxFuture<'a, Result<(), NotifierError>>;

    /// 이벤트 종류에 맞는 알림을 전송합니다.
    fn send<'a>(&'a self, event: &'a SessionEvent) -> BoxFuture<'a, Result<(), NotifierError>> {
        match event.kind {
            SessionEventKind::Login => self.send_login(event),
            SessionEventKind::Logout => self.send_logout(event),
        }
    }
}
