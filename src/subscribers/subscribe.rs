//! # Subscribe: the consumer side of the event bus
//!
//! Restart policies and diagnostics plug into the [`EventBus`](crate::EventBus)
//! by implementing [`Subscribe`]. The bus gives every subscription its own
//! bounded queue and worker task.
//!
//! ## Contract
//! - `on_event` may take its time; the publisher and the other subscribers
//!   keep going regardless.
//! - [`Subscribe::queue_capacity`] sizes the queue. Events that do not fit are
//!   dropped for this subscriber only and reported as `SubscriberOverflow`.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use hostvisor::{Event, EventKind, Subscribe};
//!
//! struct RestartPolicy;
//!
//! #[async_trait]
//! impl Subscribe for RestartPolicy {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::ProcessError {
//!             // decide whether to respawn ev.worker_id ...
//!         }
//!     }
//!     fn name(&self) -> &'static str { "restart-policy" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Lifecycle event consumer.
///
/// Runs on the subscription's own worker task; prefer async I/O over blocking calls.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes one event.
    async fn on_event(&self, event: &Event);

    /// Name used in logs and bus diagnostics.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Queue size for this subscription (clamped to 1).
    fn queue_capacity(&self) -> usize {
        1024
    }
}
