//! Feishu(Lark) 커스텀 봇 웹훅

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use loginwatch_core::config::FeishuConfig;
use loginwatch_core::event::SessionEvent;
use loginwatch_core::pipeline::BoxFuture;

use crate::error::NotifierError;
use crate::http::{build_client, post_json, require};
use crate::message::render_text;
use crate::notifier::Notifier;

const NAME: &str = "feishu";

/// 웹훅 응답. 구버전 API는 `StatusCode`/`StatusMessage`를 사용합니다.
#[derive(Debug, Deserialize)]
struct FeishuResponse {
    #[serde(default, alias = "StatusCode")]
    code: i64,
    #[serde(default, alias = "StatusMessage")]
    msg: String,
}

/// Feishu 알림 채널
pub struct FeishuNotifier {
    webhook_url: String,
    client: reqwest::Client,
}

impl FeishuNotifier {
    /// 설정에서 생성합니다.
    pub fn new(config: &FeishuConfig) -> Result<Self, NotifierError> {
        Ok(Self {
            webhook_url: require(NAME, "webhook_url", &config.webhook_url)?,
            client: build_client(NAME, Duration::from_secs(config.timeout_secs))?,
        })
    }

    /// 요청 본문
    pub fn payload(event: &SessionEvent) -> serde_json::Value {
        json!({
            "msg_type": "text",
            "content": { "text": render_text(event) },
        })
    }

    async fn deliver(&self, event: &SessionEvent) -> Result<(), NotifierError> {
        let resp: FeishuResponse =
            post_json(&self.client, NAME, &self.webhook_url, &Self::payload(event)).await?;
        if resp.code != 0 {
            return Err(NotifierError::Rejected {
                name: NAME,
                code: resp.code,
                message: resp.msg,
            });
        }
        debug!(event_id = %event.id, "feishu notification sent");
        Ok(())
    }
}

impl Notifier for FeishuNotifier {
    fn name(&self) -> &'static str {
        NAME
    }

    fn send_login<'a>(
        &'a self,
        event: &'a SessionEvent,
    ) -> BoxFuture<'a, Result<(), NotifierError>> {
        Box::pin(self.deliver(event))
    }

    fn send_logout<'a>(
        &'a self,
        event: &'a SessionEvent,
    ) -> BoxFuture<'a, Result<(), NotifierError>> {
        Box::pin(self.deliver(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use loginwatch_core::types::ServerInfo;

    #[test]
    fn requires_webhook_url() {
        let config = FeishuConfig {
            enabled: true,
            webhook_url: String::new(),
            ..FeishuConfig::default()
        };
        assert!(matches!(
            FeishuNotifier::new(&config),
            Err(NotifierError::Config { field: "webhook_url", .. })
        ));
    }

    #[test]
    fn payload_is_text_message() {
        let event = SessionEvent::login(
            "alice",
            "10.0.0.5",
            "4422",
            Arc::new(ServerInfo::new("web-01", "10.0.0.1", "Ubuntu")),
        );
        let payload = FeishuNotifier::payload(&event);
        assert_eq!(payload["msg_type"], "text");
        let text = payload["content"]["text"].as_str().unwrap();
        assert!(text.contains("User: alice"));
    }

    #[test]
    fn legacy_response_fields_are_accepted() {
        let resp: FeishuResponse =
            serde_json::from_str(r#"{"StatusCode":0,"StatusMessage":"success"}"#).unwrap();
        assert_eq!(resp.code, 0);
        let resp: FeishuResponse =
            serde_json::from_str(r#"{"code":19001,"msg":"param invalid"}"#).unwrap();
        assert_eq!(resp.code, 19001);
    }
}
