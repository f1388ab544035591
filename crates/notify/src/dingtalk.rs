//! DingTalk 커스텀 로봇 웹훅
//!
//! `secret`이 설정되면 요청마다 서명을 붙입니다.
//!
//! ```text
//! string_to_sign = "{timestamp_ms}\n{secret}"
//! sign           = base64(HMAC-SHA256(key = secret, string_to_sign))
//! url            = webhook_url + "&timestamp={timestamp_ms}&sign={urlencode(sign)}"
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use tracing::debug;

use loginwatch_core::config::DingTalkConfig;
use loginwatch_core::event::SessionEvent;
use loginwatch_core::pipeline::BoxFuture;

use crate::error::NotifierError;
use crate::http::{build_client, post_json, require};
use crate::message::{render_markdown, title};
use crate::notifier::Notifier;

const NAME: &str = "dingtalk";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Deserialize)]
struct DingTalkResponse {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

/// DingTalk 알림 채널
pub struct DingTalkNotifier {
    webhook_url: reqwest::Url,
    secret: Option<String>,
    client: reqwest::Client,
}

impl DingTalkNotifier {
    /// 설정에서 생성합니다.
    pub fn new(config: &DingTalkConfig) -> Result<Self, NotifierError> {
        let raw = require(NAME, "webhook_url", &config.webhook_url)?;
        let webhook_url = reqwest::Url::parse(&raw).map_err(|e| NotifierError::Config {
            name: NAME,
            field: "webhook_url",
            reason: e.to_string(),
        })?;
        let secret = Some(config.secret.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_owned);

        Ok(Self {
            webhook_url,
            secret,
            client: build_client(NAME, Duration::from_secs(config.timeout_secs))?,
        })
    }

    /// 요청 본문
    pub fn payload(event: &SessionEvent) -> serde_json::Value {
        json!({
            "msgtype": "markdown",
            "markdown": {
                "title": title(event.kind),
                "text": render_markdown(event),
            },
        })
    }

    /// 요청 URL. 서명이 필요하면 `timestamp`와 `sign` 쿼리를 붙입니다.
    pub fn request_url(&self, timestamp_ms: u128) -> Result<reqwest::Url, NotifierError> {
        let mut url = self.webhook_url.clone();
        if let Some(secret) = &self.secret {
            let timestamp = timestamp_ms.to_string();
            let sign = sign(secret, &timestamp)?;
            url.query_pairs_mut()
                .append_pair("timestamp", &timestamp)
                .append_pair("sign", &sign);
        }
        Ok(url)
    }

    async fn deliver(&self, event: &SessionEvent) -> Result<(), NotifierError> {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let url = self.request_url(now_ms)?;

        let resp: DingTalkResponse =
            post_json(&self.client, NAME, url.as_str(), &Self::payload(event)).await?;
        if resp.errcode != 0 {
            return Err(NotifierError::Rejected {
                name: NAME,
                code: resp.errcode,
                message: resp.errmsg,
            });
        }
        debug!(event_id = %event.id, "dingtalk notification sent");
        Ok(())
    }
}

/// 서명 값 (URL 인코딩 전)
pub fn sign(secret: &str, timestamp: &str) -> Result<String, NotifierError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| NotifierError::Config {
            name: NAME,
            field: "secret",
            reason: e.to_string(),
        })?;
    mac.update(format!("{timestamp}\n{secret}").as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

impl Notifier for DingTalkNotifier {
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
