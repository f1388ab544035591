//! 통합 테스트 -- 로컬 SMTP 스텁으로 메일 채널 대화 검증

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use loginwatch_core::config::EmailConfig;
use loginwatch_core::event::SessionEvent;
use loginwatch_core::types::ServerInfo;
use loginwatch_notify::{EmailNotifier, Notifier, NotifierError};

/// 스텁이 받은 한 번의 SMTP 트랜잭션
#[derive(Debug, Default)]
struct Transaction {
    mail_from: String,
    rcpt_to: Vec<String>,
    data: String,
}

/// 최소한의 SMTP 서버. `reject_rcpt`이면 모든 수신자를 550으로 거부합니다.
async fn spawn_smtp_stub(reject_rcpt: bool) -> (u16, mpsc::Receiver<Transaction>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = mpsc::channel(4);

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let tx = tx.clone();
            tokio::spawn(async move {
                let (read, mut write) = stream.into_split();
                let mut lines = BufReader::new(read).lines();
                let mut txn = Transaction::default();
                write.write_all(b"220 stub.local ESMTP\r\n").await.unwrap();

                while let Ok(Some(line)) = lines.next_line().await {
                    let upper = line.to_ascii_uppercase();
                    let reply: &[u8] = if upper.starts_with("EHLO") || upper.starts_with("HELO") {
                        b"250 stub.local\r\n"
                    } else if upper.starts_with("MAIL FROM:") {
                        txn.mail_from = line["MAIL FROM:".len()..].to_owned();
                        b"250 2.1.0 Ok\r\n"
                    } else if upper.starts_with("RCPT TO:") {
                        if reject_rcpt {
                            b"550 5.1.1 mailbox unavailable\r\n"
                        } else {
                            txn.rcpt_to.push(line["RCPT TO:".len()..].to_owned());
                            b"250 2.1.5 Ok\r\n"
                        }
                    } else if upper == "DATA" {
                        write.write_all(b"354 End data with <CR><LF>.<CR><LF>\r\n").await.unwrap();
                        while let Ok(Some(data_line)) = lines.next_line().await {
                            if data_line == "." {
                                break;
                            }
                            txn.data.push_str(&data_line);
                            txn.data.push('\n');
                        }
                        b"250 2.0.0 queued\r\n"
                    } else if upper == "QUIT" {
                        let _ = write.write_all(b"221 2.0.0 Bye\r\n").await;
                        break;
                    } else if upper == "RSET" || upper == "NOOP" {
                        b"250 2.0.0 Ok\r\n"
                    } else {
                        b"502 5.5.2 command not recognized\r\n"
                    };
                    if write.write_all(reply).await.is_err() {
                        break;
                    }
                }
                let _ = tx.send(txn).await;
            });
        }
    });

    (port, rx)
}

fn config(port: u16) -> EmailConfig {
    EmailConfig {
        enabled: true,
        host: "127.0.0.1".to_owned(),
        port,
        from: "Loginwatch <loginwatch@example.com>".to_owned(),
        to: vec!["ops@example.com".to_owned(), "sec@example.com".to_owned()],
        security: "none".to_owned(),
        timeout_secs: 2,
        ..EmailConfig::default()
    }
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
async fn test_email_is_delivered_to_every_recipient() {
    // Given: An SMTP server that accepts everything
    let (port, mut rx) = spawn_smtp_stub(false).await;
    let notifier = EmailNotifier::new(&config(port)).unwrap();

    // When: Sending a login notification
    notifier.send(&login_event()).await.unwrap();

    // Then: The envelope and headers reach the server
    let txn = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(txn.mail_from.starts_with("<loginwatch@example.com>"));
    assert_eq!(txn.rcpt_to, vec!["<ops@example.com>", "<sec@example.com>"]);
    assert!(txn.data.contains("Subject: "));
    assert!(txn.data.contains("ops@example.com"));
    assert!(txn.data.to_ascii_lowercase().contains("content-type: text/plain"));
}

#[tokio::test]
async fn test_rejected_recipient_reports_smtp_code() {
    let (port, _rx) = spawn_smtp_stub(true).await;
    let notifier = EmailNotifier::new(&config(port)).unwrap();

    let err = notifier.send(&login_event()).await.unwrap_err();
    assert!(
        matches!(err, NotifierError::Rejected { name: "email", code: 550, .. }),
        "got: {err:?}"
    );
}

#[tokio::test]
async fn test_unreachable_smtp_server_is_request_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let notifier = EmailNotifier::new(&config(port)).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), notifier.send(&login_event())).await;
    assert!(matches!(result, Ok(Err(NotifierError::Request { .. }))));
}
