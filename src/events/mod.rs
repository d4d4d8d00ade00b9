//! Lifecycle events: types and bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to lifecycle events emitted by worker supervisors and the
//! specialization coordinator.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`EventBus`] matcher-based fan-out plus a broadcast tap
//!
//! ## Quick reference
//! - **Publishers**: `WorkerProcessSupervisor` (`ProcessError`, `ProcessRestart`),
//!   `SpecializationCoordinator` (`Specialized`), subscriber workers (overflow/panic).
//! - **Consumers**: the external orchestrator (restart policy), `LogWriter`, tap receivers.

mod bus;
mod event;

pub use bus::EventBus;
pub(crate) use bus::WeakEventBus;
pub use event::{Event, EventKind};
