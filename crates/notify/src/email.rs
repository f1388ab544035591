//! SMTP 메일 전송
//!
//! `starttls`(기본), `tls`(암묵적 TLS), `none`(평문, 로컬 릴레이용) 세 가지 연결
//! 방식을 지원합니다. 본문은 [`render_text`] 결과를 그대로 사용합니다.

use std::fmt;
use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use loginwatch_core::config::EmailConfig;
use loginwatch_core::event::SessionEvent;
use loginwatch_core::pipeline::BoxFuture;

use crate::error::NotifierError;
use crate::http::require;
use crate::message::{render_text, title};
use crate::notifier::Notifier;

const NAME: &str = "email";

/// SMTP 연결 보안 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpSecurity {
    /// 평문 연결 후 STARTTLS
    StartTls,
    /// 처음부터 TLS
    Tls,
    /// 암호화하지 않음
    None,
}

impl SmtpSecurity {
    fn parse(value: &str) -> Result<Self, NotifierError> {
        match value {
            "starttls" => Ok(Self::StartTls),
            "tls" => Ok(Self::Tls),
            "none" => Ok(Self::None),
            other => Err(NotifierError::Config {
                name: NAME,
                field: "security",
                reason: format!("unknown mode '{other}'"),
            }),
        }
    }
}

/// SMTP 메일 알림 채널
pub struct EmailNotifier {
    from: Mailbox,
    to: Vec<Mailbox>,
    security: SmtpSecurity,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl fmt::Debug for EmailNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailNotifier")
            .field("from", &self.from.to_string())
            .field("to", &self.to.iter().map(ToString::to_string).collect::<Vec<_>>())
            .field("security", &self.security)
            .finish_non_exhaustive()
    }
}

impl EmailNotifier {
    /// 설정에서 생성합니다. 연결은 전송 시점에 맺습니다.
    pub fn new(config: &EmailConfig) -> Result<Self, NotifierError> {
        let host = require(NAME, "host", &config.host)?;
        let from = parse_mailbox("from", &require(NAME, "from", &config.from)?)?;
        let to = config
            .to
            .iter()
            .map(|addr| addr.trim())
            .filter(|addr| !addr.is_empty())
            .map(|addr| parse_mailbox("to", addr))
            .collect::<Result<Vec<_>, _>>()?;
        if to.is_empty() {
            return Err(NotifierError::Config {
                name: NAME,
                field: "to",
                reason: "at least one recipient is required".to_owned(),
            });
        }
        if config.port == 0 {
            return Err(NotifierError::Config {
                name: NAME,
                field: "port",
                reason: "must not be 0".to_owned(),
            });
        }
        if config.timeout_secs == 0 {
            return Err(NotifierError::Config {
                name: NAME,
                field: "timeout_secs",
                reason: "must be greater than zero".to_owned(),
            });
        }

        let security = SmtpSecurity::parse(&config.security)?;
        let builder = match security {
            SmtpSecurity::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&host),
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&host),
            SmtpSecurity::None => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(
                host.as_str(),
            )),
        }
        .map_err(|e| NotifierError::Config {
            name: NAME,
            field: "host",
            reason: format!("failed to set up tls: {e}"),
        })?;

        let mut builder = builder
            .port(config.port)
            .timeout(Some(Duration::from_secs(config.timeout_secs)));
        let username = config.username.trim();
        if !username.is_empty() {
            builder = builder.credentials(Credentials::new(
                username.to_owned(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            from,
            to,
            security,
            transport: builder.build(),
        })
    }

    /// 보낼 메시지를 만듭니다.
    pub fn message(&self, event: &SessionEvent) -> Result<Message, NotifierError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(title(event.kind));
        for to in &self.to {
            builder = builder.to(to.clone());
        }
        builder
            .header(ContentType::TEXT_PLAIN)
            .body(render_text(event))
            .map_err(|e| NotifierError::Request {
                name: NAME,
                reason: format!("failed to build message: {e}"),
            })
    }

    async fn deliver(&self, event: &SessionEvent) -> Result<(), NotifierError> {
        let message = self.message(event)?;
        self.transport.send(message).await.map_err(|e| match e.status() {
            // 서버가 응답 코드로 거부한 경우
            Some(code) => NotifierError::Rejected {
                name: NAME,
                code: code.to_string().parse().unwrap_or_default(),
                message: e.to_string(),
            },
            None => NotifierError::Request {
                name: NAME,
                reason: e.to_string(),
            },
        })?;
        debug!(event_id = %event.id, recipients = self.to.len(), "email notification sent");
        Ok(())
    }
}

fn parse_mailbox(field: &'static str, value: &str) -> Result<Mailbox, NotifierError> {
    value.parse().map_err(|e| NotifierError::Config {
        name: NAME,
        field,
        reason: format!("invalid address '{value}': {e}"),
    })
}

impl Notifier for EmailNotifier {
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
