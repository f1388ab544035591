//! 통합 테스트 -- 로컬 HTTP 스텁으로 채널별 요청/응답 처리 검증

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use loginwatch_core::SessionEventBus;
use loginwatch_core::config::{DingTalkConfig, FeishuConfig, TelegramConfig};
use loginwatch_core::event::SessionEvent;
use loginwatch_core::pipeline::Pipeline;
use loginwatch_core::types::ServerInfo;
use loginwatch_notify::{
    DingTalkNotifier, FeishuNotifier, Notifier, NotifierError, NotifyManager, TelegramNotifier,
};

/// 받은 요청
struct Captured {
    request_line: String,
    body: serde_json::Value,
}

/// 고정 응답을 돌려주는 HTTP 스텁. 요청마다 한 번씩 응답합니다.
async fn spawn_stub(status: u16, body: &'static str) -> (String, mpsc::Receiver<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::channel(16);

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 4096];
                let (head_end, content_length) = loop {
                    let n = stream.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        return;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                    if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                        let head = String::from_utf8_lossy(&buf[..pos]).to_lowercase();
                        let len = head
                            .lines()
                            .find_map(|l| l.strip_prefix("content-length:"))
                            .map(|v| v.trim().parse::<usize>().unwrap())
                            .unwrap_or(0);
                        break (pos + 4, len);
                    }
                };
                while buf.len() < head_end + content_length {
                    let n = stream.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }

                let request_line = String::from_utf8_lossy(&buf[..head_end])
                    .lines()
                    .next()
                    .unwrap_or_default()
                    .to_owned();
                let req_body = serde_json::from_slice(&buf[head_end..head_end + content_length])
                    .unwrap_or(serde_json::Value::Null);
                let _ = tx.send(Captured { request_line, body: req_body }).await;

                let response = format!(
                    "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    (format!("http://{addr}"), rx)
}

fn login_event() -> SessionEvent {
    SessionEvent::login(
        "alice",
        "10.0.0.5",
        "4422",
        Arc::new(ServerInfo::new("web-01", "10.0.0.1", "Ubuntu 22.04")),
    )
}

#[tokio::test]
async fn test_feishu_success() {
    let (base, mut rx) = spawn_stub(200, r#"{"code":0,"msg":"success"}"#).await;
    let notifier = FeishuNotifier::new(&FeishuConfig {
        enabled: true,
        webhook_url: format!("{base}/open-apis/bot/v2/hook/abc"),
        ..FeishuConfig::default()
    })
    .unwrap();

    notifier.send(&login_event()).await.unwrap();

    let captured = rx.recv().await.unwrap();
    assert!(captured.request_line.starts_with("POST /open-apis/bot/v2/hook/abc"));
    assert_eq!(captured.body["msg_type"], "text");
    assert!(
        captured.body["content"]["text"]
            .as_str()
            .unwrap()
            .contains("Source: 10.0.0.5:4422")
    );
}

#[tokio::test]
async fn test_feishu_nonzero_code_is_rejected() {
    let (base, _rx) = spawn_stub(200, r#"{"code":19021,"msg":"sign match fail"}"#).await;
    let notifier = FeishuNotifier::new(&FeishuConfig {
        enabled: true,
        webhook_url: format!("{base}/hook"),
        ..FeishuConfig::default()
    })
    .unwrap();

    let err = notifier.send(&login_event()).await.unwrap_err();
    assert!(matches!(err, NotifierError::Rejected { code: 19021, .. }));
}

#[tokio::test]
async fn test_dingtalk_signed_request() {
    let (base, mut rx) = spawn_stub(200, r#"{"errcode":0,"errmsg":"ok"}"#).await;
    let notifier = DingTalkNotifier::new(&DingTalkConfig {
        enabled: true,
        webhook_url: format!("{base}/robot/send?access_token=tok"),
        secret: "SECxyz".to_owned(),
        ..DingTalkConfig::default()
    })
    .unwrap();

    notifier.send(&login_event()).await.unwrap();

    let captured = rx.recv().await.unwrap();
    assert!(captured.request_line.contains("access_token=tok&timestamp="));
    assert!(captured.request_line.contains("&sign="));
    assert_eq!(captured.body["msgtype"], "markdown");
}

#[tokio::test]
async fn test_dingtalk_errcode_is_rejected() {
    let (base, _rx) = spawn_stub(200, r#"{"errcode":310000,"errmsg":"keywords not in content"}"#).await;
    let notifier = DingTalkNotifier::new(&DingTalkConfig {
        enabled: true,
        webhook_url: format!("{base}/robot/send?access_token=tok"),
        ..DingTalkConfig::default()
    })
    .unwrap();

    let err = notifier.send(&login_event()).await.unwrap_err();
    assert!(err.to_string().contains("keywords not in content"));
}

#[tokio::test]
async fn test_telegram_success_and_path() {
    let (base, mut rx) = spawn_stub(200, r#"{"ok":true,"result":{}}"#).await;
    let notifier = TelegramNotifier::new(&TelegramConfig {
        enabled: true,
        bot_token: "42:XYZ".to_owned(),
        chat_id: "-1001".to_owned(),
        api_base: base,
        ..TelegramConfig::default()
    })
    .unwrap();

    notifier.send(&login_event()).await.unwrap();

    let captured = rx.recv().await.unwrap();
    assert!(captured.request_line.starts_with("POST /bot42:XYZ/sendMessage"));
    assert_eq!(captured.body["chat_id"], "-1001");
    assert_eq!(captured.body["parse_mode"], "HTML");
}

#[tokio::test]
async fn test_http_error_status_is_reported() {
    let (base, _rx) = spawn_stub(400, r#"{"ok":false,"error_code":400,"description":"Bad Request"}"#).await;
    let notifier = TelegramNotifier::new(&TelegramConfig {
        enabled: true,
        bot_token: "42:XYZ".to_owned(),
        chat_id: "-1001".to_owned(),
        api_base: base,
        ..TelegramConfig::default()
    })
    .unwrap();

    let err = notifier.send(&login_event()).await.unwrap_err();
    assert!(matches!(err, NotifierError::Status { status: 400, .. }));
}

#[tokio::test]
async fn test_unreachable_endpoint_fails_within_timeout() {
    // 바인드 후 바로 닫아 연결 거부를 유도
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let notifier = FeishuNotifier::new(&FeishuConfig {
        enabled: true,
        webhook_url: format!("http://{addr}/hook"),
        timeout_secs: 1,
    })
    .unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), notifier.send(&login_event())).await;
    assert!(matches!(result, Ok(Err(NotifierError::Request { .. }))));
}

/// 버스 → 관리자 → HTTP 채널 전체 흐름
#[tokio::test]
async fn test_manager_delivers_bus_events() {
    let (base, mut rx) = spawn_stub(200, r#"{"code":0}"#).await;
    let feishu = FeishuNotifier::new(&FeishuConfig {
        enabled: true,
        webhook_url: format!("{base}/hook"),
        ..FeishuConfig::default()
    })
    .unwrap();

    let bus = SessionEventBus::new(16);
    let mut manager = NotifyManager::new(bus.clone(), vec![Arc::new(feishu) as Arc<dyn Notifier>]);
    manager.start().await.unwrap();

    assert_eq!(bus.publish(Arc::new(login_event())), 1);

    let captured = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(
        captured.body["content"]["text"]
            .as_str()
            .unwrap()
            .starts_with("🔔 SSH Login")
    );

    manager.stop().await.unwrap();
    assert_eq!(manager.stats().sent(), 1);
}
