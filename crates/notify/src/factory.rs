//! 설정에서 알림 채널 목록을 생성합니다.

use std::sync::Arc;

use tracing::{info, warn};

use loginwatch_core::config::NotifyConfig;

use crate::dingtalk::DingTalkNotifier;
use crate::email::EmailNotifier;
use crate::error::NotifierError;
use crate::feishu::FeishuNotifier;
use crate::notifier::Notifier;
use crate::telegram::TelegramNotifier;

/// 활성화된 채널을 생성합니다. 생성에 실패한 채널은 로그를 남기고 건너뜁니다.
pub fn build_notifiers(config: &NotifyConfig) -> Vec<Arc<dyn Notifier>> {
    let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();

    if config.feishu.enabled {
        push(&mut notifiers, FeishuNotifier::new(&config.feishu));
    }
    if config.dingtalk.enabled {
        push(&mut notifiers, DingTalkNotifier::new(&config.dingtalk));
    }
    if config.telegram.enabled {
        push(&mut notifiers, TelegramNotifier::new(&config.telegram));
    }
    if config.email.enabled {
        push(&mut notifiers, EmailNotifier::new(&config.email));
    }

    info!(
        count = notifiers.len(),
        names = ?notifiers.iter().map(|n| n.name()).collect::<Vec<_>>(),
        "notifiers initialized"
    );
    notifiers
}

fn push<N: Notifier + 'static>(
    notifiers: &mut Vec<Arc<dyn Notifier>>,
    built: Result<N, NotifierError>,
) {
    match built {
        Ok(notifier) => notifiers.push(Arc::new(notifier)),
        Err(e) => warn!(notifier = e.notifier(), error = %e, "skipping notifier"),
    }
}
