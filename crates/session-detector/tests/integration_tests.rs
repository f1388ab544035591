//! 통합 테스트 -- 라인 입력부터 버스 발행까지의 전체 흐름 검증

use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use loginwatch_core::bus::Subscription;
use loginwatch_core::event::SharedSessionEvent;
use loginwatch_core::pipeline::Pipeline;
use loginwatch_core::types::{ServerInfo, SessionEventKind, UNKNOWN_IP, UNKNOWN_PORT};
use loginwatch_core::SessionEventBus;
use loginwatch_session_detector::{
    DedupWindow, DetectorSettings, DetectorState, DetectorStats, LineOutcome, LineProcessor,
    ServerInfoHandle, SessionDetectorBuilder, SessionKey,
};

const LOGIN_ALICE: &str = "sshd[100]: Accepted password for alice from 10.0.0.5 port 4422 ssh2";
const DISCONNECTED_ALICE: &str = "sshd[101]: Disconnected from user alice 10.0.0.5 port 4422";
const CLOSED_ALICE: &str = "sshd[101]: pam_unix(sshd:session): session closed for user alice";
const CLOSED_BOB: &str = "sshd[102]: pam_unix(sshd:session): session closed for user bob";

fn server() -> ServerInfoHandle {
    ServerInfoHandle::fixed(ServerInfo::new("web-01", "10.0.0.1", "Debian GNU/Linux 12"))
}

fn processor_with(bus: SessionEventBus) -> LineProcessor {
    LineProcessor::new(
        Arc::new(DedupWindow::new(Duration::from_secs(5))),
        bus,
        server(),
        Arc::new(DetectorStats::default()),
    )
    .expect("patterns compile")
}

fn drain(sub: &mut Subscription<SharedSessionEvent>) -> Vec<SharedSessionEvent> {
    std::iter::from_fn(|| sub.try_recv()).collect()
}

/// 로그인 라인 하나 → 로그인 이벤트 하나
#[test]
fn test_login_line_publishes_login() {
    let bus = SessionEventBus::new(16);
    let mut sub = bus.subscribe();
    let mut p = processor_with(bus);

    p.process_line(LOGIN_ALICE);

    let events = drain(&mut sub);
    assert_eq!(events.len(), 1);
    let e = &events[0];
    assert_eq!(e.kind, SessionEventKind::Login);
    assert_eq!(
        (e.username.as_str(), e.ip.as_str(), e.port.as_str()),
        ("alice", "10.0.0.5", "4422")
    );
}

/// 로그인 후 완전한 로그아웃 → 같은 식별 정보, 세션 제거
#[test]
fn test_login_then_logout_closes_session() {
    let bus = SessionEventBus::new(16);
    let mut sub = bus.subscribe();
    let mut p = processor_with(bus);

    p.process_line(LOGIN_ALICE);
    p.process_line(DISCONNECTED_ALICE);

    let events = drain(&mut sub);
    assert_eq!(events.len(), 2);
    let logout = &events[1];
    assert_eq!(logout.kind, SessionEventKind::Logout);
    assert_eq!(
        (logout.username.as_str(), logout.ip.as_str(), logout.port.as_str()),
        ("alice", "10.0.0.5", "4422")
    );
    assert!(!p.sessions().contains(&SessionKey::new("alice", "10.0.0.5", "4422")));
}

/// 테이블이 비어 있을 때 사용자명만 있는 로그아웃 → 센티널 주소
#[test]
fn test_unmatched_logout_uses_sentinels() {
    let bus = SessionEventBus::new(16);
    let mut sub = bus.subscribe();
    let mut p = processor_with(bus);

    p.process_line(CLOSED_BOB);

    let events = drain(&mut sub);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].username, "bob");
    assert_eq!(events[0].ip, UNKNOWN_IP);
    assert_eq!(events[0].port, UNKNOWN_PORT);
}

/// 같은 연결 종료의 두 로그아웃 라인 → 로그아웃 하나
#[test]
fn test_back_to_back_logout_lines_emit_once() {
    let bus = SessionEventBus::new(16);
    let mut sub = bus.subscribe();
    let mut p = processor_with(bus);

    p.process_line(LOGIN_ALICE);
    p.process_line(DISCONNECTED_ALICE);
    let second = p.process_line(CLOSED_ALICE);

    assert!(matches!(second, LineOutcome::Suppressed(_)));
    let logouts = drain(&mut sub)
        .into_iter()
        .filter(|e| e.kind == SessionEventKind::Logout)
        .count();
    assert_eq!(logouts, 1);
}

/// 윈도우가 지난 같은 로그아웃은 다시 발행
#[test]
fn test_same_logout_after_window_is_published() {
    let bus = SessionEventBus::new(16);
    let mut sub = bus.subscribe();
    let mut p = processor_with(bus);
    let t0 = Instant::now();
    let wall = SystemTime::now();

    p.process_line_at(DISCONNECTED_ALICE, t0, wall);
    p.process_line_at(DISCONNECTED_ALICE, t0 + Duration::from_secs(2), wall);
    p.process_line_at(DISCONNECTED_ALICE, t0 + Duration::from_secs(6), wall);

    assert_eq!(drain(&mut sub).len(), 2);
}

/// 구독자 둘 → 같은 인스턴스를 각자 순서대로 수신
#[test]
fn test_fan_out_to_two_subscribers() {
    let bus = SessionEventBus::new(16);
    let mut a = bus.subscribe();
    let mut b = bus.subscribe();
    let mut p = processor_with(bus);

    p.process_line(LOGIN_ALICE);
    p.process_line(DISCONNECTED_ALICE);

    let from_a = drain(&mut a);
    let from_b = drain(&mut b);
    assert_eq!(from_a.len(), 2);
    assert_eq!(from_b.len(), 2);
    for (x, y) in from_a.iter().zip(&from_b) {
        assert!(Arc::ptr_eq(x, y));
    }
    assert_eq!(from_a[0].kind, SessionEventKind::Login);
    assert_eq!(from_a[1].kind, SessionEventKind::Logout);
}

/// 실제 tail 프로세스로 파일 끝에 추가된 라인만 처리
#[tokio::test]
async fn test_detector_follows_appended_lines() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    // 시작 전 내용은 무시되어야 함
    writeln!(file, "sshd[1]: Accepted password for old from 10.0.0.9 port 1111 ssh2").unwrap();
    file.flush().unwrap();

    let settings = DetectorSettings::default().with_log_file(file.path());
    let (mut detector, sub) = SessionDetectorBuilder::new()
        .settings(settings)
        .server_info(server())
        .build()
        .unwrap();
    let mut sub = sub.unwrap();

    detector.start().await.unwrap();
    assert_eq!(detector.state(), DetectorState::Running);
    assert!(detector.health_check().await.is_healthy());

    writeln!(file, "{LOGIN_ALICE}").unwrap();
    writeln!(file, "{DISCONNECTED_ALICE}").unwrap();
    writeln!(file, "{CLOSED_ALICE}").unwrap();
    file.flush().unwrap();

    let login = tokio::time::timeout(Duration::from_secs(5), sub.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(login.kind, SessionEventKind::Login);
    assert_eq!(login.username, "alice");

    let logout = tokio::time::timeout(Duration::from_secs(5), sub.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(logout.kind, SessionEventKind::Logout);

    // 세 번째 라인은 억제됨
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(sub.try_recv().is_none());
    assert_eq!(detector.stats().suppressed, 1);

    detector.stop().await.unwrap();
    assert_eq!(detector.state(), DetectorState::Stopped);
    assert!(detector.stop().await.is_err());
}

/// start() 직후 바로 추가된 라인도 유실되지 않음
#[tokio::test]
async fn test_lines_written_right_after_start_are_seen() {
    for round in 0..5 {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "sshd[1]: Accepted password for old from 10.0.0.9 port 1111 ssh2").unwrap();
        file.flush().unwrap();

        let settings = DetectorSettings::default().with_log_file(file.path());
        let (mut detector, sub) = SessionDetectorBuilder::new()
            .settings(settings)
            .server_info(server())
            .build()
            .unwrap();
        let mut sub = sub.unwrap();

        detector.start().await.unwrap();
        writeln!(file, "{LOGIN_ALICE}").unwrap();
        file.flush().unwrap();

        let login = tokio::time::timeout(Duration::from_secs(3), sub.recv())
            .await
            .unwrap_or_else(|_| panic!("round {round}: login not delivered"))
            .unwrap();
        assert_eq!(login.username, "alice", "round {round}");

        detector.stop().await.unwrap();
    }
}

/// 정지 후 재시작 가능
#[tokio::test]
async fn test_detector_restart() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let settings = DetectorSettings::default().with_log_file(file.path());
    let (mut detector, _sub) = SessionDetectorBuilder::new()
        .settings(settings)
        .server_info(server())
        .build()
        .unwrap();

    detector.start().await.unwrap();
    assert!(detector.start().await.is_err());
    detector.stop().await.unwrap();

    detector.start().await.unwrap();
    assert_eq!(detector.state(), DetectorState::Running);
    detector.stop().await.unwrap();
}
