//! 이벤트 버스 -- 탐지기와 알림 모듈을 잇는 fan-out 채널
//!
//! ```text
//! SessionDetector ──publish──▶ EventBus ──┬──▶ Subscription (NotifyManager)
//!                                          ├──▶ Subscription (audit logger)
//!                                          └──▶ ...
//! ```
//!
//! - 구독자마다 독립된 bounded `mpsc` 채널을 가집니다 (work-stealing이 아닌 복제).
//! - `publish`는 절대 블로킹하지 않습니다. 구독자 버퍼가 가득 차면
//!   그 구독자에 대한 이벤트만 버리고 다음 구독자로 넘어갑니다.
//! - 구독자 목록은 하나의 뮤텍스로 보호되며, publish 순회와 구독 해제가
//!   같은 락을 공유하므로 해제된 채널로 전송되는 일이 없습니다.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::metrics as m;

/// 구독자별 기본 버퍼 크기
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 256;

/// 구독 식별자
pub type SubscriptionId = u64;

struct Subscriber<E> {
    id: SubscriptionId,
    tx: mpsc::Sender<E>,
}

struct BusInner<E> {
    subscribers: Mutex<Vec<Subscriber<E>>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl<E> BusInner<E> {
    fn lock(&self) -> MutexGuard<'_, Vec<Subscriber<E>>> {
        // 목록은 단순 Vec이므로 poison 상태여도 그대로 사용 가능
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// fan-out 이벤트 버스
///
/// `Clone`은 같은 버스를 가리키는 핸들을 복제합니다.
pub struct EventBus<E> {
    inner: Arc<BusInner<E>>,
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Clone + Send + 'static> EventBus<E> {
    /// 구독자별 버퍼 크기를 지정하여 버스를 생성합니다.
    ///
    /// `capacity`가 0이면 1로 보정됩니다 (`mpsc::channel`은 0을 허용하지 않음).
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                capacity: capacity.max(1),
            }),
        }
    }

    /// 새 구독을 생성합니다. 이후에 발행되는 이벤트부터 수신합니다.
    pub fn subscribe(&self) -> Subscription<E> {
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.lock().push(Subscriber { id, tx });
        debug!(subscription_id = id, "event bus subscriber added");
        Subscription {
            id,
            rx,
            bus: self.clone(),
        }
    }

    /// 구독을 해제합니다. 해당 채널의 송신측이 drop되어 수신측은 종료를 관측합니다.
    ///
    /// 이미 해제된 id면 `false`를 반환합니다.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.inner.lock();
        let before = subs.len();
        subs.retain(|s| s.id != id);
        let removed = subs.len() != before;
        if removed {
            debug!(subscription_id = id, "event bus subscriber removed");
        }
        removed
    }

    /// 이벤트를 모든 구독자에게 발행하고, 실제로 전달된 구독자 수를 반환합니다.
    ///
    /// 가득 찬 구독자는 이번 이벤트를 놓치고, 수신측이 닫힌 구독자는 목록에서 제거됩니다.
    pub fn publish(&self, event: E) -> usize {
        let mut subs = self.inner.lock();
        let mut delivered = 0;
        subs.retain(|sub| match sub.tx.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!(
                    subscription_id = sub.id,
                    "subscriber buffer full, dropping event"
                );
                metrics::counter!(m::BUS_EVENTS_DROPPED_TOTAL).increment(1);
                true
            }
            Err(TrySendError::Closed(_)) => {
                debug!(
                    subscription_id = sub.id,
                    "subscriber receiver closed, removing"
                );
                false
            }
        });
        metrics::counter!(m::BUS_EVENTS_PUBLISHED_TOTAL).increment(1);
        delivered
    }

    /// 현재 구독자 수
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().len()
    }
}

impl<E: Clone + Send + 'static> Default for EventBus<E> {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_CAPACITY)
    }
}

/// 버스 구독 핸들
///
/// drop되면 자동으로 구독이 해제됩니다.
pub struct Subscription<E: Clone + Send + 'static> {
    id: SubscriptionId,
    rx: mpsc::Receiver<E>,
    bus: EventBus<E>,
}

impl<E: Clone + Send + 'static> Subscription<E> {
    /// 구독 식별자
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// 다음 이벤트를 기다립니다. 구독이 해제되면 `None`을 반환합니다.
    pub async fn recv(&mut self) -> Option<E> {
        self.rx.recv().await
    }

    /// 대기 없이 다음 이벤트를 가져옵니다.
    pub fn try_recv(&mut self) -> Option<E> {
        self.rx.try_recv().ok()
    }

    /// 구독을 명시적으로 해제합니다.
    pub fn unsubscribe(self) {
        // Drop에서 처리
    }
}

impl<E: Clone + Send + 'static> Drop for Subscription<E> {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.id);
        self.rx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fan_out_delivers_same_value_to_each_subscriber() {
        let bus: EventBus<Arc<String>> = EventBus::new(8);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        let event = Arc::new("login alice".to_owned());
        assert_eq!(bus.publish(Arc::clone(&event)), 2);

        let got_a = a.recv().await.unwrap();
        let got_b = b.recv().await.unwrap();
        assert!(Arc::ptr_eq(&got_a, &event));
        assert!(Arc::ptr_eq(&got_b, &event));
    }

    #[tokio::test]
    async fn order_is_preserved_per_subscriber() {
        let bus: EventBus<u32> = EventBus::new(16);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        for i in 0..10 {
            bus.publish(i);
        }
        for i in 0..10 {
            assert_eq!(a.recv().await, Some(i));
        }
        for i in 0..10 {
            assert_eq!(b.recv().await, Some(i));
        }
    }

    #[tokio::test]
    async fn subscriber_only_sees_events_after_subscribe() {
        let bus: EventBus<u32> = EventBus::new(4);
        bus.publish(1);
        let mut sub = bus.subscribe();
        bus.publish(2);
        assert_eq!(sub.recv().await, Some(2));
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn full_subscriber_drops_without_blocking_others() {
        let bus: EventBus<u32> = EventBus::new(1);
        let mut slow = bus.subscribe();
        let mut fast = bus.subscribe();

        assert_eq!(bus.publish(1), 2);
        assert_eq!(fast.try_recv(), Some(1));

        // slow는 아직 1을 읽지 않아 가득 참
        assert_eq!(bus.publish(2), 1);
        assert_eq!(fast.try_recv(), Some(2));

        assert_eq!(slow.try_recv(), Some(1));
        assert!(slow.try_recv().is_none());
        // 가득 찼던 구독자도 목록에는 남아 있음
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn unsubscribe_removes_from_fan_out() {
        let bus: EventBus<u32> = EventBus::new(4);
        let a = bus.subscribe();
        let mut b = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        a.unsubscribe();
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(bus.publish(7), 1);
        assert_eq!(b.try_recv(), Some(7));
    }

    #[test]
    fn unsubscribe_unknown_id_returns_false() {
        let bus: EventBus<u32> = EventBus::new(4);
        let sub = bus.subscribe();
        let id = sub.id();
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn unsubscribed_receiver_observes_close() {
        let bus: EventBus<u32> = EventBus::new(4);
        let mut sub = bus.subscribe();
        assert!(bus.unsubscribe(sub.id()));
        assert_eq!(sub.recv().await, None);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let bus: EventBus<u32> = EventBus::new(0);
        let mut sub = bus.subscribe();
        assert_eq!(bus.publish(3), 1);
        assert_eq!(sub.try_recv(), Some(3));
    }

    #[test]
    fn publish_without_subscribers_is_noop() {
        let bus: EventBus<u32> = EventBus::default();
        assert_eq!(bus.publish(1), 0);
    }

    #[test]
    fn ids_are_distinct() {
        let bus: EventBus<u32> = EventBus::default();
        let a = bus.subscribe();
        let b = bus.subscribe();
        assert_ne!(a.id(), b.id());
    }
}
