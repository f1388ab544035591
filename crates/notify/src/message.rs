//! 알림 본문 생성
//!
//! 모든 채널이 같은 필드를 같은 순서로 보여줍니다.
//!
//! ```text
//! 🔔 SSH Login
//! User:      alice
//! Source:    10.0.0.5:4422
//! Time:      2024-03-01 10:00:00
//! Host:      web-01
//! Server IP: 10.0.0.1
//! OS:        Ubuntu 22.04.4 LTS
//! ```

use std::time::SystemTime;

use chrono::{DateTime, Local};

use loginwatch_core::event::SessionEvent;
use loginwatch_core::types::SessionEventKind;

/// 시각 표시 형식
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 로컬 시각 문자열
pub fn format_time(time: SystemTime) -> String {
    DateTime::<Local>::from(time).format(TIME_FORMAT).to_string()
}

/// 알림 제목
pub fn title(kind: SessionEventKind) -> &'static str {
    match kind {
        SessionEventKind::Login => "🔔 SSH Login",
        SessionEventKind::Logout => "🔔 SSH Logout",
    }
}

/// 본문 필드 `(라벨, 값)` 목록
pub fn fields(event: &SessionEvent) -> [(&'static str, String); 6] {
    [
        ("User", event.username.clone()),
        ("Source", format!("{}:{}", event.ip, event.port)),
        ("Time", format_time(event.timestamp())),
        ("Host", event.server_info.hostname.clone()),
        ("Server IP", event.server_info.ip.clone()),
        ("OS", event.server_info.os_type.clone()),
    ]
}

/// 일반 텍스트 본문
pub fn render_text(event: &SessionEvent) -> String {
    let mut out = String::from(title(event.kind));
    for (label, value) in fields(event) {
        out.push('\n');
        out.push_str(label);
        out.push_str(": ");
        out.push_str(&value);
    }
    out
}

/// Markdown 본문
pub fn render_markdown(event: &SessionEvent) -> String {
    let mut out = format!("### {}\n", title(event.kind));
    for (label, value) in fields(event) {
        out.push_str(&format!("\n- **{label}**: {value}"));
    }
    out
}

/// Telegram HTML 본문. 값은 이스케이프됩니다.
pub fn render_html(event: &SessionEvent) -> String {
    let mut out = format!("<b>{}</b>", title(event.kind));
    for (label, value) in fields(event) {
        out.push_str(&format!("\n{label}: <code>{}</code>", escape_html(&value)));
    }
    out
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
