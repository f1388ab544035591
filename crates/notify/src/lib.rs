#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`notifier`]: 알림 채널 trait (`Notifier`)
//! - [`message`]: 알림 본문 생성 (텍스트, Markdown, HTML)
//! - [`feishu`], [`dingtalk`], [`telegram`], [`email`]: 채널 구현
//! - [`factory`]: 설정에서 채널 목록 생성
//! - [`manager`]: 버스 구독과 동시 전송 (Pipeline trait 구현)
//! - [`error`]: 도메인 에러 타입

pub mod dingtalk;
pub mod email;
pub mod error;
pub mod factory;
pub mod feishu;
mod http;
pub mod manager;
pub mod message;
pub mod notifier;
pub mod telegram;

// --- 주요 타입 re-export ---

pub use error::NotifierError;
pub use factory::build_notifiers;
pub use manager::{NotifyManager, NotifyStats};
pub use notifier::Notifier;

pub use dingtalk::DingTalkNotifier;
pub use email::{EmailNotifier, SmtpSecurity};
pub use feishu::FeishuNotifier;
pub use telegram::TelegramNotifier;
