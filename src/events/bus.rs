//! # Event bus for lifecycle events.
//!
//! [`EventBus`] decouples producers (worker supervisors, the specialization
//! coordinator) from consumers (orchestration policy, diagnostics).
//!
//! ## Architecture
//! ```text
//! Publishers (many):                      Consumers:
//!   WorkerProcessSupervisor ──┐
//!   WorkerProcessSupervisor ──┼──► EventBus::publish ──┬──► SubscriberSet (matcher → queue → worker)
//!   SpecializationCoordinator ┘                        └──► tap (tokio::sync::broadcast)
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never awaits; per-subscriber queues use `try_send`
//!   and the tap uses `broadcast::Sender::send`.
//! - **Isolation**: every subscriber has its own bounded queue and worker task, so a slow or
//!   panicking subscriber stalls neither the publisher nor its peers.
//! - **Best-effort generations**: a subscription added while a publish is in flight may or
//!   may not observe that event.
//! - **Tap lag**: slow tap receivers get `RecvError::Lagged(n)` and skip `n` oldest items.

use std::sync::{Arc, Weak};

use tokio::sync::broadcast;

use super::event::Event;
use crate::subscribers::{EventMatcher, Subscribe, SubscriberSet, SubscriptionHandle};

struct Shared {
    tx: broadcast::Sender<Event>,
    subs: SubscriberSet,
}

/// In-process publish/subscribe fabric.
///
/// ### Properties
/// - **Non-blocking**: `publish()` returns immediately.
/// - **Fire-and-forget**: no delivery or durability guarantees beyond per-subscriber FIFO.
/// - **Cloneable**: cheap to clone (internally holds an `Arc`).
#[derive(Clone)]
pub struct EventBus {
    shared: Arc<Shared>,
}

/// Non-owning reference to an [`EventBus`], held by subscriber workers.
#[derive(Clone)]
pub(crate) struct WeakEventBus {
    shared: Weak<Shared>,
}

impl WeakEventBus {
    pub(crate) fn upgrade(&self) -> Option<EventBus> {
        self.shared.upgrade().map(|shared| EventBus { shared })
    }
}

impl EventBus {
    /// Creates a new bus whose tap channel holds `capacity` events (clamped to 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self {
            shared: Arc::new(Shared {
                tx,
                subs: SubscriberSet::new(),
            }),
        }
    }

    /// Publishes an event to every matching subscriber and to all tap receivers.
    ///
    /// Subscribers whose queue is full or closed miss the event; a
    /// `SubscriberOverflow` diagnostic is published for each of them.
    pub fn publish(&self, ev: Event) {
        let overflows = self.shared.subs.emit(&ev);
        let _ = self.shared.tx.send(ev);
        for overflow in overflows {
            self.shared.subs.emit(&overflow);
            let _ = self.shared.tx.send(overflow);
        }
    }

    /// Registers a subscriber that receives events accepted by `matcher`.
    ///
    /// Spawns the subscriber's worker task; must be called within a Tokio runtime.
    pub fn subscribe<M>(&self, sub: Arc<dyn Subscribe>, matcher: M) -> SubscriptionHandle
    where
        M: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        let matcher: EventMatcher = Arc::new(matcher);
        self.shared.subs.add(sub, matcher, self.downgrade())
    }

    /// Registers a subscriber that receives every event.
    pub fn subscribe_all(&self, sub: Arc<dyn Subscribe>) -> SubscriptionHandle {
        self.subscribe(sub, |_| true)
    }

    /// Removes a subscription. Its worker drains already-queued events and exits.
    ///
    /// Returns `false` if the handle was already removed.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        self.shared.subs.remove(handle)
    }

    /// Creates a passive receiver of every event published after this call.
    pub fn tap(&self) -> broadcast::Receiver<Event> {
        self.shared.tx.subscribe()
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.shared.subs.len()
    }

    /// Closes all subscriptions and awaits their workers.
    pub async fn shutdown(&self) {
        self.shared.subs.shutdown().await;
    }

    pub(crate) fn downgrade(&self) -> WeakEventBus {
        WeakEventBus {
            shared: Arc::downgrade(&self.shared),
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::{Notify, mpsc};

    struct Collect {
        tx: mpsc::UnboundedSender<Event>,
    }

    #[async_trait]
    impl Subscribe for Collect {
        async fn on_event(&self, event: &Event) {
            let _ = self.tx.send(event.clone());
        }

        fn name(&self) -> &'static str {
            "collect"
        }
    }

    fn collector() -> (Arc<Collect>, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Collect { tx }), rx)
    }

    /// Blocks inside `on_event` until released.
    struct Stuck {
        release: Arc<Notify>,
        seen: Mutex<usize>,
    }

    #[async_trait]
    impl Subscribe for Stuck {
        async fn on_event(&self, _event: &Event) {
            self.release.notified().await;
            *self.seen.lock().unwrap() += 1;
        }

        fn name(&self) -> &'static str {
            "stuck"
        }

        fn queue_capacity(&self) -> usize {
            1
        }
    }

    struct Panics;

    #[async_trait]
    impl Subscribe for Panics {
        async fn on_event(&self, _event: &Event) {
            panic!("subscriber exploded");
        }

        fn name(&self) -> &'static str {
            "panics"
        }
    }

    #[tokio::test]
    async fn test_matcher_filters_events() {
        let bus = EventBus::new(16);
        let (sub, mut rx) = collector();
        bus.subscribe(sub, |ev| ev.kind == EventKind::ProcessError);

        bus.publish(Event::specialized());
        bus.publish(Event::process_error("w1", 1, "exit"));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::ProcessError);
        assert!(
            tokio::time::timeout(Duration::from_millis(50), rx.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_per_subscriber_fifo() {
        let bus = EventBus::new(16);
        let (sub, mut rx) = collector();
        bus.subscribe_all(sub);

        for code in 0..10 {
            bus.publish(Event::process_error("w1", code, "exit"));
        }
        for code in 0..10 {
            assert_eq!(rx.recv().await.unwrap().exit_code, Some(code));
        }
    }

    #[tokio::test]
    async fn test_slow_subscriber_does_not_stall_others() {
        let bus = EventBus::new(16);
        let release = Arc::new(Notify::new());
        let stuck = Arc::new(Stuck {
            release: release.clone(),
            seen: Mutex::new(0),
        });
        let (fast, mut rx) = collector();
        bus.subscribe_all(stuck.clone());
        bus.subscribe(fast, |ev| ev.kind == EventKind::ProcessError);
        let mut tap = bus.tap();

        for code in 0..5 {
            bus.publish(Event::process_error("w1", code, "exit"));
        }
        for code in 0..5 {
            assert_eq!(rx.recv().await.unwrap().exit_code, Some(code));
        }

        let mut overflowed = false;
        while let Ok(Ok(ev)) = tokio::time::timeout(Duration::from_millis(50), tap.recv()).await {
            if ev.kind == EventKind::SubscriberOverflow {
                assert_eq!(ev.subscriber, Some("stuck"));
                overflowed = true;
            }
        }
        assert!(overflowed);
        release.notify_waiters();
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let bus = EventBus::new(16);
        let (sub, mut rx) = collector();
        let handle = bus.subscribe_all(sub);
        assert_eq!(bus.subscriber_count(), 1);

        assert!(bus.unsubscribe(&handle));
        assert!(!bus.unsubscribe(&handle));
        assert_eq!(bus.subscriber_count(), 0);

        bus.publish(Event::specialized());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_panicking_subscriber_is_reported() {
        let bus = EventBus::new(16);
        let mut tap = bus.tap();
        let (sub, mut rx) = collector();
        bus.subscribe_all(Arc::new(Panics));
        bus.subscribe(sub, |ev| ev.kind == EventKind::Specialized);

        bus.publish(Event::specialized());
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::Specialized);

        loop {
            let ev = tap.recv().await.unwrap();
            if ev.kind == EventKind::SubscriberPanicked {
                assert_eq!(ev.subscriber, Some("panics"));
                assert_eq!(ev.detail.as_deref(), Some("subscriber exploded"));
                break;
            }
        }
    }
}
