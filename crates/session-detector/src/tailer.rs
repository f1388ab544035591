//! 로그 추적 -- 외부 `tail -c +<offset> -F` 프로세스의 출력을 라인 단위로 읽습니다.
//!
//! 로테이션과 truncation은 `tail -F`가 처리합니다. 탐지기가 시작 시점에 기록한
//! 파일 길이 이후의 바이트만 처리하므로, `tail`이 파일을 열기 전에 추가된
//! 라인도 빠지지 않습니다.

use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::process::{Child, ChildStdout, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::DetectorError;
use crate::processor::LineProcessor;

/// 최대 라인 길이 (바이트). 초과분은 잘라냅니다.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// 읽기 루프 종료 사유
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadLoopExit {
    /// 취소 토큰에 의해 종료
    Cancelled,
    /// 스트림 종료 (tail 프로세스 종료)
    StreamEnded,
    /// 읽기 실패
    Failed(String),
}

impl ReadLoopExit {
    /// 정상 종료(취소)가 아닌지 여부
    pub fn is_abnormal(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

/// 실행 중인 tail 프로세스
#[derive(Debug)]
pub struct TailProcess {
    /// 자식 프로세스 (drop 시 종료됨)
    pub child: Child,
    /// 표준 출력
    pub stdout: ChildStdout,
}

/// `{command} -c +{offset + 1} -F {path}`를 실행합니다.
///
/// `offset`은 이미 처리한 것으로 간주할 바이트 수입니다. 보통 시작 시점의 파일 길이입니다.
pub fn spawn_tail(command: &str, path: &Path, offset: u64) -> Result<TailProcess, DetectorError> {
    let mut child = Command::new(command)
        .arg("-c")
        .arg(format!("+{}", offset.saturating_add(1)))
        .arg("-F")
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| DetectorError::Tailer(format!("failed to spawn '{command}': {e}")))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| DetectorError::Tailer("tail stdout not captured".to_owned()))?;

    debug!(command, path = %path.display(), offset, pid = ?child.id(), "tail process spawned");
    Ok(TailProcess { child, stdout })
}

/// 한 라인을 `buf`에 읽습니다.
///
/// `MAX_LINE_LENGTH`를 넘는 부분은 버퍼에 담지 않고 소비만 하므로 개행이 없는
/// 입력에도 메모리 사용량이 제한됩니다. 반환값은 소비한 바이트 수(0이면 EOF)와
/// 잘림 여부입니다.
pub async fn read_capped_line<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> std::io::Result<(usize, bool)>
where
    R: AsyncBufRead + Unpin,
{
    let mut consumed = 0;
    let mut truncated = false;
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok((consumed, truncated));
        }

        let (chunk, line_done) = match available.iter().position(|&b| b == b'\n') {
            Some(end) => (&available[..=end], true),
            None => (available, false),
        };
        let room = MAX_LINE_LENGTH.saturating_sub(buf.len());
        if chunk.len() > room {
            truncated = true;
        }
        buf.extend_from_slice(&chunk[..chunk.len().min(room)]);

        let used = chunk.len();
        reader.consume(used);
        consumed += used;
        if line_done {
            return Ok((consumed, truncated));
        }
    }
}

/// 라인을 읽어 처리기에 넘깁니다. 취소되거나 스트림이 끝날 때까지 반복합니다.
///
/// 잘못된 UTF-8은 대체 문자로 바꾸고, 끝의 `\r\n`은 제거합니다.
pub async fn run_read_loop<R>(
    mut reader: R,
    processor: &mut LineProcessor,
    cancel: CancellationToken,
) -> ReadLoopExit
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::with_capacity(512);
    loop {
        buf.clear();
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => return ReadLoopExit::Cancelled,
            read = read_capped_line(&mut reader, &mut buf) => read,
        };

        match read {
            Ok((0, _)) => return ReadLoopExit::StreamEnded,
            Ok((consumed, truncated)) => {
                if truncated {
                    warn!(len = consumed, "auth log line too long, truncating");
                }
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\r', '\n']);
                if !line.is_empty() {
                    processor.process_line(line);
                }
            }
            Err(e) => return ReadLoopExit::Failed(e.to_string()),
        }
    }
}
