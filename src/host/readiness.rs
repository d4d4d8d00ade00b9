//! # Readiness tracker.
//!
//! Tracks [`HostState`] with lock-free reads and offers a bounded,
//! non-blocking wait for the host to become invokable.
//!
//! ## Architecture
//! ```text
//! host-health path ──► set_state() / notify_health_changed()
//!                             │ AtomicU8 store + Notify::notify_waiters()
//!                             ▼
//! request ──► can_invoke() ── state == Running && health.is_healthy()
//! request ──► delay_until_host_ready(timeout)
//!                 loop { enable(notified) → check → select!{ notified | sleep(poll) } }
//!                 └─► timeout elapsed → false
//! ```
//!
//! ## Rules
//! - Reads never lock; only the host-health path writes the state.
//! - Waiters register for notification **before** checking, so no wakeup is lost.
//! - A wait never outlives its `timeout`; expiry yields `false`, never an error.
//! - A regression to `Offline` ends waits early with `false`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, warn};

use super::state::{HostHealth, HostState};

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Tracks host readiness for the admission gate.
pub struct ReadinessTracker {
    state: AtomicU8,
    health: Arc<dyn HostHealth>,
    changed: Notify,
    poll_interval: Duration,
}

impl ReadinessTracker {
    /// Creates a tracker in `initial` state.
    ///
    /// `poll_interval` bounds how long a waiter can miss a health change that
    /// was not announced via [`notify_health_changed`](Self::notify_health_changed).
    pub fn new(initial: HostState, health: Arc<dyn HostHealth>, poll_interval: Duration) -> Self {
        Self {
            state: AtomicU8::new(initial as u8),
            health,
            changed: Notify::new(),
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
        }
    }

    /// Current host state.
    #[inline]
    pub fn state(&self) -> HostState {
        HostState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Records a state transition and wakes all waiters.
    pub fn set_state(&self, next: HostState) {
        let prev = HostState::from_u8(self.state.swap(next as u8, Ordering::AcqRel));
        if prev != next {
            if next == HostState::Offline {
                warn!(from = prev.as_label(), "host went offline");
            } else {
                debug!(from = prev.as_label(), to = next.as_label(), "host state changed");
            }
        }
        self.changed.notify_waiters();
    }

    /// Wakes waiters so they re-check the delegated health signal now.
    pub fn notify_health_changed(&self) {
        self.changed.notify_waiters();
    }

    /// True iff the host is `Running` and the inner host reports healthy.
    #[inline]
    pub fn can_invoke(&self) -> bool {
        self.state() == HostState::Running && self.health.is_healthy()
    }

    /// Suspends until the host can invoke functions, at most `timeout`.
    ///
    /// Returns `true` when ready, `false` on expiry or when the host goes offline.
    pub async fn delay_until_host_ready(&self, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.changed.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                if self.can_invoke() {
                    return true;
                }
                if self.state() == HostState::Offline {
                    return false;
                }

                tokio::select! {
                    _ = &mut notified => {}
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            }
        };

        tokio::time::timeout(timeout, wait).await.unwrap_or(false)
    }
}

impl std::fmt::Debug for ReadinessTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessTracker")
            .field("state", &self.state())
            .field("healthy", &self.health.is_healthy())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HealthFlag;

    fn tracker(state: HostState, healthy: bool) -> (Arc<ReadinessTracker>, Arc<HealthFlag>) {
        let flag = Arc::new(HealthFlag::new(healthy));
        let t = Arc::new(ReadinessTracker::new(
            state,
            flag.clone(),
            Duration::from_millis(100),
        ));
        (t, flag)
    }

    #[test]
    fn test_can_invoke_requires_running_and_healthy() {
        assert!(tracker(HostState::Running, true).0.can_invoke());
        assert!(!tracker(HostState::Running, false).0.can_invoke());
        assert!(!tracker(HostState::Standby, true).0.can_invoke());
        assert!(!tracker(HostState::Offline, true).0.can_invoke());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_host_returns_immediately() {
        let (t, _) = tracker(HostState::Running, true);
        let started = tokio::time::Instant::now();
        assert!(t.delay_until_host_ready(Duration::from_secs(5)).await);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_expires_with_false() {
        let (t, _) = tracker(HostState::Standby, false);
        let started = tokio::time::Instant::now();
        assert!(!t.delay_until_host_ready(Duration::from_secs(2)).await);
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_notification_wakes_waiter() {
        let (t, _) = tracker(HostState::Standby, true);
        let t2 = t.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            t2.set_state(HostState::Running);
        });

        let started = tokio::time::Instant::now();
        assert!(t.delay_until_host_ready(Duration::from_secs(5)).await);
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_health_change_is_polled() {
        let (t, flag) = tracker(HostState::Running, false);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            flag.set(true);
        });

        assert!(t.delay_until_host_ready(Duration::from_secs(5)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_going_offline_ends_wait() {
        let (t, _) = tracker(HostState::Standby, false);
        let t2 = t.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            t2.set_state(HostState::Offline);
        });

        let started = tokio::time::Instant::now();
        assert!(!t.delay_until_host_ready(Duration::from_secs(5)).await);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
