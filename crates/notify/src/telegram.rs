//! Telegram Bot API `sendMessage`

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use loginwatch_core::config::TelegramConfig;
use loginwatch_core::event::SessionEvent;
use loginwatch_core::pipeline::BoxFuture;

use crate::error::NotifierError;
use crate::http::{build_client, post_json, require};
use crate::message::render_html;
use crate::notifier::Notifier;

const NAME: &str = "telegram";

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    error_code: i64,
    #[serde(default)]
    description: String,
}

/// Telegram 알림 채널
pub struct TelegramNotifier {
    /// 봇 토큰이 포함되므로 로그에 남기지 않음
    endpoint: String,
    chat_id: String,
    client: reqwest::Client,
}

impl fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("endpoint", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

impl TelegramNotifier {
    /// 설정에서 생성합니다.
    pub fn new(config: &TelegramConfig) -> Result<Self, NotifierError> {
        let token = require(NAME, "bot_token", &config.bot_token)?;
        let chat_id = require(NAME, "chat_id", &config.chat_id)?;
        let api_base = require(NAME, "api_base", &config.api_base)?;

        Ok(Self {
            endpoint: format!("{}/bot{token}/sendMessage", api_base.trim_end_matches('/')),
            chat_id,
            client: build_client(NAME, Duration::from_secs(config.timeout_secs))?,
        })
    }

    /// 요청 본문
    pub fn payload(&self, event: &SessionEvent) -> serde_json::Value {
        json!({
            "chat_id": self.chat_id,
            "text": render_html(event),
            "parse_mode": "HTML",
        })
    }

    async fn deliver(&self, event: &SessionEvent) -> Result<(), NotifierError> {
        let resp: TelegramResponse =
            post_json(&self.client, NAME, &self.endpoint, &self.payload(event)).await?;
        if !resp.ok {
            return Err(NotifierError::Rejected {
                name: NAME,
                code: resp.error_code,
                message: resp.description,
            });
        }
        debug!(event_id = %event.id, "telegram notification sent");
        Ok(())
    }
}

impl Notifier for TelegramNotifier {
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
