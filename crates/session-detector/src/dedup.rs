//! 로그아웃 중복 억제 윈도우
//!
//! 하나의 실제 연결 종료에 대해 "Received disconnect"와 "session closed"처럼
//! 여러 라인이 기록되는 경우가 흔합니다. [`DedupWindow`]는 최근에 발행한
//! 로그아웃 키를 기억하여 윈도우 안의 중복 발행을 막습니다.
//!
//! # 만료
//! ```text
//! check_and_record(key, now) ──insert──▶ map[key] = now
//!                            ──push────▶ heap (now + window, key)
//!
//! janitor (tick) ──purge_expired(now)──▶ heap에서 만료 시각이 지난 항목을 꺼내
//!                                         map 값이 갱신되지 않았으면 삭제
//! ```
//!
//! 윈도우가 지났지만 아직 정리되지 않은 항목은 없는 것으로 취급합니다.
//! 맵은 읽기 루프와 janitor 태스크가 함께 접근하므로 `RwLock`으로 보호합니다.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use loginwatch_core::types::is_sentinel;

use crate::session::SessionKey;

/// janitor 주기의 하한
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// 로그아웃 중복 억제 윈도우
#[derive(Debug)]
pub struct DedupWindow {
    window: Duration,
    /// 키 -> 마지막 발행 시각
    records: RwLock<HashMap<SessionKey, Instant>>,
    /// 만료 예정 시각 min-heap
    expirations: Mutex<BinaryHeap<Reverse<(Instant, SessionKey)>>>,
}

impl DedupWindow {
    /// 주어진 윈도우로 생성합니다.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            records: RwLock::new(HashMap::new()),
            expirations: Mutex::new(BinaryHeap::new()),
        }
    }

    /// 윈도우 길이
    pub fn window(&self) -> Duration {
        self.window
    }

    fn is_live(&self, emitted_at: Instant, now: Instant) -> bool {
        now.saturating_duration_since(emitted_at) < self.window
    }

    /// 중복이면 `true`를 반환합니다. 중복이 아니면 `now`로 기록하고 `false`를 반환합니다.
    pub fn check_and_record(&self, key: &SessionKey, now: Instant) -> bool {
        {
            let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(&at) = records.get(key)
                && self.is_live(at, now)
            {
                return true;
            }
        }

        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        // 읽기 락을 놓은 사이의 변경 재확인
        if let Some(&at) = records.get(key)
            && self.is_live(at, now)
        {
            return true;
        }
        records.insert(key.clone(), now);
        drop(records);

        self.expirations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Reverse((now + self.window, key.clone())));
        false
    }

    /// 윈도우 안에 있는지 확인만 합니다 (기록하지 않음).
    pub fn contains(&self, key: &SessionKey, now: Instant) -> bool {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        records.get(key).is_some_and(|&at| self.is_live(at, now))
    }

    /// 최근 발행된 키 중 사용자명이 일치하고 주소가 확정된 키를 찾습니다.
    pub fn find_recent_by_user(&self, username: &str, now: Instant) -> Option<SessionKey> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        records
            .iter()
            .filter(|(key, at)| self.is_live(**at, now) && key.username == username)
            .find(|(key, _)| !is_sentinel(&key.ip) && !is_sentinel(&key.port))
            .map(|(key, _)| key.clone())
    }

    /// 최근 발행된 키 중 주소가 일치하고 사용자명이 확정된 키를 찾습니다.
    pub fn find_recent_by_addr(&self, ip: &str, port: &str, now: Instant) -> Option<SessionKey> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        records
            .iter()
            .filter(|(key, at)| self.is_live(**at, now) && key.ip == ip && key.port == port)
            .find(|(key, _)| !is_sentinel(&key.username))
            .map(|(key, _)| key.clone())
    }

    /// 만료된 항목을 제거하고 제거한 수를 반환합니다.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let mut due = Vec::new();
        {
            let mut heap = self
                .expirations
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            while let Some(Reverse((expires_at, _))) = heap.peek() {
                if *expires_at > now {
                    break;
                }
                if let Some(Reverse((_, key))) = heap.pop() {
                    due.push(key);
                }
            }
        }

        if due.is_empty() {
            return 0;
        }

        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let mut removed = 0;
        for key in due {
            // 그 사이 다시 기록된 키는 새 heap 항목이 처리
            if let Some(&at) = records.get(&key)
                && !self.is_live(at, now)
            {
                records.remove(&key);
                removed += 1;
            }
        }
        removed
    }

    /// 기록된 항목 수 (만료되었지만 아직 정리되지 않은 항목 포함)
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 주기적으로 만료 항목을 정리하는 janitor 태스크를 시작합니다.
    ///
    /// `cancel`이 취소되면 종료합니다. `interval`은 [`MIN_SWEEP_INTERVAL`] 이상으로 보정됩니다.
    pub fn spawn_janitor(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let window = Arc::clone(self);
        let interval = interval.max(MIN_SWEEP_INTERVAL);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = window.purge_expired(tokio::time::Instant::now().into_std());
                        if removed > 0 {
                            debug!(removed, "purged expired logout dedup entries");
                        }
                    }
                    _ = cancel.cancelled() => {
                        debug!("dedup janitor stopped");
                        break;
                    }
                }
            }
        })
    }
}
