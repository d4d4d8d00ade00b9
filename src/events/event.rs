//! # Lifecycle events published by worker supervisors and the specialization coordinator.
//!
//! The [`EventKind`] enum classifies event types across two categories:
//! - **Lifecycle events**: worker process errors, restart requests, specialization
//! - **Bus diagnostics**: subscriber overflow and panics
//!
//! The [`Event`] struct carries additional metadata such as timestamps, worker id,
//! exit code and a human-readable detail.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Per-subscriber delivery is FIFO; there is no ordering guarantee across subscribers.
//!
//! ## Example
//! ```rust
//! use hostvisor::{Event, EventKind};
//!
//! let ev = Event::process_error("node-1", 137, "killed");
//!
//! assert_eq!(ev.kind, EventKind::ProcessError);
//! assert_eq!(ev.worker_id.as_deref(), Some("node-1"));
//! assert_eq!(ev.exit_code, Some(137));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of bus events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Worker lifecycle ===
    /// Worker process exited with a code other than the intentional-termination sentinel.
    ///
    /// Sets:
    /// - `worker_id`: logical worker id
    /// - `exit_code`: process exit code
    /// - `detail`: exit description
    ProcessError,

    /// Worker needs to be replaced; the orchestrator decides how.
    ///
    /// Sets:
    /// - `worker_id`: logical worker id
    /// - `attempt`: restart requests seen by this worker's supervisor (1-based)
    ProcessRestart,

    // === Host lifecycle ===
    /// Standby host finished specializing.
    Specialized,

    // === Bus diagnostics ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `subscriber`: subscriber name
    /// - `detail`: panic message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `subscriber`: subscriber name
    /// - `detail`: reason string (e.g., "full", "closed")
    SubscriberOverflow,
}

impl EventKind {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::ProcessError => "process_error",
            EventKind::ProcessRestart => "process_restart",
            EventKind::Specialized => "specialized",
            EventKind::SubscriberPanicked => "subscriber_panicked",
            EventKind::SubscriberOverflow => "subscriber_overflow",
        }
    }
}

/// Bus event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Logical worker id, if applicable.
    pub worker_id: Option<Arc<str>>,
    /// Process exit code.
    pub exit_code: Option<i32>,
    /// Restart request count.
    pub attempt: Option<u32>,
    /// Subscriber name for bus diagnostics.
    pub subscriber: Option<&'static str>,
    /// Human-readable detail (exit description, overflow reason, panic message).
    pub detail: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            worker_id: None,
            exit_code: None,
            attempt: None,
            subscriber: None,
            detail: None,
        }
    }

    /// Attaches a worker id.
    #[inline]
    pub fn with_worker(mut self, worker_id: impl Into<Arc<str>>) -> Self {
        self.worker_id = Some(worker_id.into());
        self
    }

    /// Attaches an exit code.
    #[inline]
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a human-readable detail.
    #[inline]
    pub fn with_detail(mut self, detail: impl Into<Arc<str>>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// `ProcessError{workerId, exitCode, detail}`.
    #[inline]
    pub fn process_error(worker_id: &str, exit_code: i32, detail: impl Into<Arc<str>>) -> Self {
        Event::new(EventKind::ProcessError)
            .with_worker(worker_id)
            .with_exit_code(exit_code)
            .with_detail(detail)
    }

    /// `ProcessRestart{workerId}`.
    #[inline]
    pub fn process_restart(worker_id: &str, attempt: u32) -> Self {
        Event::new(EventKind::ProcessRestart)
            .with_worker(worker_id)
            .with_attempt(attempt)
    }

    /// `Specialized{}`.
    #[inline]
    pub fn specialized() -> Self {
        Event::new(EventKind::Specialized)
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        let mut ev = Event::new(EventKind::SubscriberOverflow)
            .with_detail(format!("subscriber={subscriber} reason={reason}"));
        ev.subscriber = Some(subscriber);
        ev
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        let mut ev = Event::new(EventKind::SubscriberPanicked).with_detail(info);
        ev.subscriber = Some(subscriber);
        ev
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }
}
