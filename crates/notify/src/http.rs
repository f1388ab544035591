//! 공통 HTTP 전송

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::NotifierError;

/// 에러 메시지에 담을 응답 본문 최대 길이
const MAX_ERROR_BODY: usize = 256;

/// 타임아웃이 설정된 클라이언트를 생성합니다.
pub(crate) fn build_client(
    name: &'static str,
    timeout: Duration,
) -> Result<reqwest::Client, NotifierError> {
    if timeout.is_zero() {
        return Err(NotifierError::Config {
            name,
            field: "timeout_secs",
            reason: "must be greater than zero".to_owned(),
        });
    }
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| NotifierError::Config {
            name,
            field: "timeout_secs",
            reason: format!("failed to build http client: {e}"),
        })
}

/// 필수 문자열 설정을 확인합니다.
pub(crate) fn require(
    name: &'static str,
    field: &'static str,
    value: &str,
) -> Result<String, NotifierError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(NotifierError::Config {
            name,
            field,
            reason: "must not be empty".to_owned(),
        });
    }
    Ok(value.to_owned())
}

/// JSON을 POST하고 응답 본문을 `R`로 파싱합니다.
///
/// 2xx가 아니면 [`NotifierError::Status`]를 반환합니다.
pub(crate) async fn post_json<B, R>(
    client: &reqwest::Client,
    name: &'static str,
    url: &str,
    body: &B,
) -> Result<R, NotifierError>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|e| NotifierError::Request {
            name,
            reason: e.without_url().to_string(),
        })?;

    let status = response.status();
    let text = response.text().await.map_err(|e| NotifierError::Request {
        name,
        reason: format!("failed to read response: {}", e.without_url()),
    })?;

    if !status.is_success() {
        return Err(NotifierError::Status {
            name,
            status: status.as_u16(),
            body: truncate(&text),
        });
    }

    serde_json::from_str(&text).map_err(|e| NotifierError::Request {
        name,
        reason: format!("invalid response body: {e}: {}", truncate(&text)),
    })
}

fn truncate(text: &str) -> String {
    match text.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_owned(),
    }
}
