//! # SubscriberSet: non-blocking, matcher-based fan-out
//!
//! [`SubscriberSet`] distributes each [`Event`] to every subscription whose
//! matcher accepts it, **without awaiting** their processing.
//!
//! ## What it guarantees
//! - `emit(&Event)` returns immediately.
//! - Per-subscriber FIFO (queue order).
//! - Panics inside subscribers are caught and reported (isolation).
//! - Diagnostics about a subscriber are not delivered to that subscriber.
//! - Subscriptions can be added and removed at any time.
//!
//! ## What it does **not** guarantee
//! - No global ordering across different subscribers.
//! - No retries on per-subscriber queue overflow (events are dropped for that
//!   subscriber).
//!
//! ## Diagram
//! ```text
//!    emit(&Event)
//!        │        matcher?        (Arc-clone per subscriber)
//!        ├──── S1 ──yes──► [queue S1] ─► worker S1 ─► on_event()
//!        ├──── S2 ──no───✗
//!        └──── SN ──yes──► [queue SN] ─► worker SN ─► on_event()
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use super::Subscribe;
use crate::events::{Event, WeakEventBus};

/// Predicate selecting which events a subscription receives.
pub type EventMatcher = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

/// Handle identifying one subscription; pass it to
/// [`EventBus::unsubscribe`](crate::EventBus::unsubscribe).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: u64,
    name: &'static str,
}

impl SubscriptionHandle {
    /// Name of the subscriber behind this handle.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Per-subscriber channel with metadata
struct SubscriberChannel {
    id: u64,
    name: &'static str,
    matcher: EventMatcher,
    sender: mpsc::Sender<Arc<Event>>,
    worker: JoinHandle<()>,
}

/// Composite fan-out with per-subscriber bounded queues and worker tasks.
pub struct SubscriberSet {
    channels: RwLock<Vec<SubscriberChannel>>,
    next_id: AtomicU64,
}

impl SubscriberSet {
    pub(crate) fn new() -> Self {
        Self {
            channels: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Adds a subscription and spawns its worker.
    ///
    /// The queue holds `max(queue_capacity, 1)` events.
    /// Worker isolation: panics are caught and reported as `SubscriberPanicked`.
    pub(crate) fn add(
        &self,
        sub: Arc<dyn Subscribe>,
        matcher: EventMatcher,
        bus: WeakEventBus,
    ) -> SubscriptionHandle {
        let cap = sub.queue_capacity().max(1);
        let name = sub.name();
        let (tx, mut rx) = mpsc::channel::<Arc<Event>>(cap);

        let worker = tokio::spawn(async move {
            while let Some(ev) = rx.recv().await {
                let fut = sub.on_event(ev.as_ref());
                if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                    let info = panic_message(panic_err.as_ref());
                    if let Some(bus) = bus.upgrade() {
                        bus.publish(Event::subscriber_panicked(name, info));
                    }
                }
            }
        });

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.write().push(SubscriberChannel {
            id,
            name,
            matcher,
            sender: tx,
            worker,
        });
        SubscriptionHandle { id, name }
    }

    /// Removes a subscription; its worker drains queued events and exits.
    pub(crate) fn remove(&self, handle: &SubscriptionHandle) -> bool {
        let mut channels = self.write();
        let before = channels.len();
        channels.retain(|c| c.id != handle.id);
        channels.len() != before
    }

    /// Fan-out one event to all matching subscribers (non-blocking).
    ///
    /// Returns one `SubscriberOverflow` event per subscriber whose queue was
    /// **full** or **closed**. Overflow events never produce further overflows.
    pub(crate) fn emit(&self, event: &Event) -> Vec<Event> {
        let is_overflow_evt = event.is_subscriber_overflow();
        let mut overflows = Vec::new();

        let ev = Arc::new(event.clone());
        for channel in self.read().iter() {
            // a subscriber never receives diagnostics about itself
            if event.subscriber == Some(channel.name) || !(channel.matcher)(event) {
                continue;
            }
            let reason = match channel.sender.try_send(Arc::clone(&ev)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            if !is_overflow_evt {
                overflows.push(Event::subscriber_overflow(channel.name, reason));
            }
        }
        overflows
    }

    /// Graceful shutdown: close all queues and await worker completion.
    pub(crate) async fn shutdown(&self) {
        let channels: Vec<SubscriberChannel> = self.write().drain(..).collect();
        let mut workers = Vec::with_capacity(channels.len());
        for channel in channels {
            drop(channel.sender);
            workers.push(channel.worker);
        }
        for w in workers {
            let _ = w.await;
        }
    }

    /// Number of subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// True if there are no subscriptions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<SubscriberChannel>> {
        self.channels.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<SubscriberChannel>> {
        self.channels.write().unwrap_or_else(|e| e.into_inner())
    }
}

pub(crate) fn panic_message(any: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = any.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = any.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
