//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `loginwatch_`
//! - 모듈명: `bus_`, `detector_`, `notify_`, `system_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds` (gauge/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! metrics::counter!(loginwatch_core::metrics::DETECTOR_LOGINS_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 알림 채널 레이블 키 (feishu, dingtalk, telegram)
pub const LABEL_NOTIFIER: &str = "notifier";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── Event Bus 메트릭 ──────────────────────────────────────────────

/// Bus: 발행된 이벤트 수 (counter)
pub const BUS_EVENTS_PUBLISHED_TOTAL: &str = "loginwatch_bus_events_published_total";

/// Bus: 구독자 버퍼 초과로 버려진 이벤트 수 (counter)
pub const BUS_EVENTS_DROPPED_TOTAL: &str = "loginwatch_bus_events_dropped_total";

// ─── Session Detector 메트릭 ───────────────────────────────────────

/// Detector: 읽은 로그 라인 수 (counter)
pub const DETECTOR_LINES_TOTAL: &str = "loginwatch_detector_lines_total";

/// Detector: 발행된 로그인 이벤트 수 (counter)
pub const DETECTOR_LOGINS_TOTAL: &str = "loginwatch_detector_logins_total";

/// Detector: 발행된 로그아웃 이벤트 수 (counter)
pub const DETECTOR_LOGOUTS_TOTAL: &str = "loginwatch_detector_logouts_total";

/// Detector: 중복으로 억제된 로그아웃 수 (counter)
pub const DETECTOR_DUPLICATES_SUPPRESSED_TOTAL: &str =
    "loginwatch_detector_duplicates_suppressed_total";

/// Detector: 세션 테이블 조회 실패로 센티널이 채워진 로그아웃 수 (counter)
pub const DETECTOR_CORRELATION_MISSES_TOTAL: &str = "loginwatch_detector_correlation_misses_total";

/// Detector: 현재 세션 테이블 크기 (gauge)
pub const DETECTOR_ACTIVE_SESSIONS: &str = "loginwatch_detector_active_sessions";

// ─── Notify 메트릭 ─────────────────────────────────────────────────

/// Notify: 알림 전송 시도 수 (counter, label: notifier, result)
pub const NOTIFY_SENT_TOTAL: &str = "loginwatch_notify_sent_total";

// ─── System Monitor 메트릭 ─────────────────────────────────────────

/// System: 전체 CPU 사용률 (gauge, %)
pub const SYSTEM_CPU_USAGE_PERCENT: &str = "loginwatch_system_cpu_usage_percent";

/// System: 사용 중인 메모리 (gauge, 바이트)
pub const SYSTEM_MEMORY_USED_BYTES: &str = "loginwatch_system_memory_used_bytes";

/// System: 1분 평균 부하 (gauge)
pub const SYSTEM_LOAD1: &str = "loginwatch_system_load1";

/// System: 실행 중인 프로세스 수 (gauge)
pub const SYSTEM_PROCESSES: &str = "loginwatch_system_processes";

/// System: ESTABLISHED 상태 TCP 연결 수 (gauge)
pub const SYSTEM_TCP_ESTABLISHED: &str = "loginwatch_system_tcp_established";

/// System: 샘플링 실패 수 (counter)
pub const SYSTEM_SAMPLE_FAILURES_TOTAL: &str = "loginwatch_system_sample_failures_total";

// ─── Daemon 메트릭 ─────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "loginwatch_daemon_uptime_seconds";

/// Daemon: 빌드 정보 (gauge, 항상 1)
pub const DAEMON_BUILD_INFO: &str = "loginwatch_daemon_build_info";

/// 모든 메트릭의 설명을 등록합니다.
///
/// recorder 설치 후 한 번 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    // Event Bus
    describe_counter!(
        BUS_EVENTS_PUBLISHED_TOTAL,
        "Total number of events published on the event bus"
    );
    describe_counter!(
        BUS_EVENTS_DROPPED_TOTAL,
        "Events dropped because a subscriber buffer was full"
    );

    // Session Detector
    describe_counter!(
        DETECTOR_LINES_TOTAL,
        "Total number of auth log lines read by the detector"
    );
    describe_counter!(DETECTOR_LOGINS_TOTAL, "Login events published");
    describe_counter!(DETECTOR_LOGOUTS_TOTAL, "Logout events published");
    describe_counter!(
        DETECTOR_DUPLICATES_SUPPRESSED_TOTAL,
        "Logout events suppressed by the dedup window"
    );
    describe_counter!(
        DETECTOR_CORRELATION_MISSES_TOTAL,
        "Logout events published with placeholder fields after a session table miss"
    );
    describe_gauge!(
        DETECTOR_ACTIVE_SESSIONS,
        "Number of open sessions in the session table"
    );

    // Notify
    describe_counter!(
        NOTIFY_SENT_TOTAL,
        "Notification attempts per notifier and result"
    );

    // System Monitor
    describe_gauge!(SYSTEM_CPU_USAGE_PERCENT, "Global CPU usage in percent");
    describe_gauge!(SYSTEM_MEMORY_USED_BYTES, "Used physical memory in bytes");
    describe_gauge!(SYSTEM_LOAD1, "One minute load average");
    describe_gauge!(SYSTEM_PROCESSES, "Number of processes");
    describe_gauge!(
        SYSTEM_TCP_ESTABLISHED,
        "Number of TCP connections in ESTABLISHED state"
    );
    describe_counter!(
        SYSTEM_SAMPLE_FAILURES_TOTAL,
        "System resource samples that failed"
    );

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "Daemon uptime in seconds");
    describe_gauge!(DAEMON_BUILD_INFO, "Daemon build information");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_all_does_not_panic() {
        // recorder 없이 호출해도 panic 없어야 함
        describe_all();
    }

    #[test]
    fn metric_names_share_prefix() {
        let names = [
            BUS_EVENTS_PUBLISHED_TOTAL,
            BUS_EVENTS_DROPPED_TOTAL,
            DETECTOR_LINES_TOTAL,
            DETECTOR_LOGINS_TOTAL,
            DETECTOR_LOGOUTS_TOTAL,
            DETECTOR_DUPLICATES_SUPPRESSED_TOTAL,
            DETECTOR_CORRELATION_MISSES_TOTAL,
            DETECTOR_ACTIVE_SESSIONS,
            NOTIFY_SENT_TOTAL,
            SYSTEM_CPU_USAGE_PERCENT,
            SYSTEM_MEMORY_USED_BYTES,
            SYSTEM_LOAD1,
            SYSTEM_PROCESSES,
            SYSTEM_TCP_ESTABLISHED,
            SYSTEM_SAMPLE_FAILURES_TOTAL,
            DAEMON_UPTIME_SECONDS,
            DAEMON_BUILD_INFO,
        ];
        for name in names {
            assert!(name.starts_with("loginwatch_"), "{name}");
        }
    }

    #[test]
    fn counters_end_with_total() {
        for name in [
            BUS_EVENTS_DROPPED_TOTAL,
            DETECTOR_LINES_TOTAL,
            NOTIFY_SENT_TOTAL,
        ] {
            assert!(name.ends_with("_total"), "{name}");
        }
    }

    #[test]
    fn label_keys_are_lowercase() {
        for label in [LABEL_NOTIFIER, LABEL_RESULT] {
            assert_eq!(label, label.to_lowercase());
        }
    }
}
