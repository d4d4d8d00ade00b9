//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the per-subscriber fan-out
//! ([`SubscriberSet`]) used by the [`EventBus`](crate::EventBus), and the
//! built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   WorkerProcessSupervisor ── publish(Event) ──► EventBus ──► SubscriberSet
//!                                                                 │ matcher
//!                                                      ┌──────────┼──────────┐
//!                                                      ▼          ▼          ▼
//!                                                 Orchestrator LogWriter  Custom
//! ```
//!
//! ## Subscriber types
//! - **Policy subscribers**: own restart decisions for crashed workers (external).
//! - **Passive subscribers**: observe and report (logging, metrics).

mod log;
mod set;
mod subscribe;

pub use log::LogWriter;
pub(crate) use set::panic_message;
pub use set::{EventMatcher, SubscriberSet, SubscriptionHandle};
pub use subscribe::Subscribe;
