//! # hostvisor
//!
//! **Hostvisor** is the admission and lifecycle-control layer of a serverless
//! function host.
//!
//! It gates every inbound request against host readiness, drives the one-time
//! transition of a pre-warmed placeholder host into a tenant-specialized one,
//! and supervises the external language-runtime worker processes that execute
//! user code.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   inbound request
//!         ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  AdmissionGate (per request)                                      │
//! │  - request id + RequestStarted / RequestCompleted traces          │
//! │  - drain wait (hooks)                                             │
//! │  - SpecializationCoordinator::ensure_specialized()                │
//! │  - ReadinessTracker: offline response / bounded wait / 503        │
//! │  - downstream chain (Next), error → status mapping                │
//! └──────┬──────────────────────────┬─────────────────────────────────┘
//!        ▼                          ▼
//! ┌──────────────────┐   ┌───────────────────────────┐
//! │ ReadinessTracker │   │ SpecializationCoordinator │
//! │ (atomic state,   │   │ (CAS, detached unit tied  │
//! │  Notify + poll)  │   │  to the host token)       │
//! └──────────────────┘   └─────────────┬─────────────┘
//!                                      │ Specialized
//!  ┌─────────────────────────┐         │
//!  │ WorkerProcessSupervisor │─────────┤ ProcessError / ProcessRestart
//!  │ (one per worker id)     │         │
//!  └─────────────────────────┘         ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                 EventBus (per-subscriber queues + tap)            │
//! └───────────────────────────────┬───────────────────────────────────┘
//!                           ┌─────┼─────────────┐
//!                           ▼     ▼             ▼
//!                  orchestrator  LogWriter    custom
//!                  (restarts)
//! ```
//!
//! ## Features
//! | Area               | Description                                                     | Key types / traits                                  |
//! |--------------------|-----------------------------------------------------------------|-----------------------------------------------------|
//! | **Admission**      | Per-request gating, trace records, error mapping                | [`AdmissionGate`], [`TraceSink`], [`Next`]          |
//! | **Readiness**      | Host state and the bounded wait-for-ready primitive             | [`ReadinessTracker`], [`HostState`], [`HostHealth`] |
//! | **Specialization** | Exactly-once, context-isolated exit from standby                | [`SpecializationCoordinator`], [`Specializer`]      |
//! | **Workers**        | Spawn and monitor external worker processes                     | [`WorkerProcessSupervisor`], [`ProcessFactory`]     |
//! | **Events**         | Lifecycle events and non-blocking fan-out                       | [`EventBus`], [`Event`], [`Subscribe`]              |
//! | **Errors**         | Tagged pipeline and worker errors                               | [`HostError`], [`WorkerError`]                      |
//! | **Configuration**  | Centralized settings                                            | [`HostConfig`]                                      |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use async_trait::async_trait;
//! use tokio_util::sync::CancellationToken;
//! use hostvisor::{
//!     AdmissionGate, EventBus, HealthFlag, HostConfig, HostError, HostState, HttpContext,
//!     Next, ReadinessTracker, SpecializationCoordinator, Specializer, StandbyEnvironment,
//! };
//!
//! struct Placeholder;
//! impl StandbyEnvironment for Placeholder {
//!     fn in_standby_mode(&self) -> bool { false }
//!     fn is_container_ready(&self) -> bool { true }
//! }
//!
//! struct Noop;
//! #[async_trait]
//! impl Specializer for Noop {
//!     async fn specialize_host(&self, _ctx: CancellationToken) -> Result<(), HostError> { Ok(()) }
//! }
//!
//! struct Hello;
//! #[async_trait]
//! impl Next for Hello {
//!     async fn run(&self, ctx: &mut HttpContext) -> Result<(), HostError> {
//!         ctx.response.write_body("hello");
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), HostError> {
//!     let cfg = HostConfig::default();
//!     let bus = EventBus::new(cfg.bus_capacity_clamped());
//!     let readiness = Arc::new(ReadinessTracker::new(
//!         HostState::Running,
//!         Arc::new(HealthFlag::new(true)),
//!         cfg.readiness_poll_interval,
//!     ));
//!     let coordinator = Arc::new(SpecializationCoordinator::new(
//!         Arc::new(Placeholder),
//!         Arc::new(Noop),
//!         bus.clone(),
//!         CancellationToken::new(),
//!     ));
//!
//!     let gate = AdmissionGate::builder(cfg)
//!         .with_readiness(readiness)
//!         .with_specialization(coordinator)
//!         .with_next(Arc::new(Hello))
//!         .build()?;
//!
//!     let mut ctx = HttpContext::new(http::Request::get("/api/hello").body(()).unwrap());
//!     gate.handle(&mut ctx).await?;
//!     assert_eq!(ctx.response.body(), b"hello");
//!     Ok(())
//! }
//! ```
mod config;
mod error;
mod events;
mod gate;
mod host;
mod specialization;
mod subscribers;
mod telemetry;
mod worker;

// ---- Public re-exports ----

pub use config::HostConfig;
pub use error::{HostError, WorkerError};
pub use events::{Event, EventBus, EventKind};
pub use gate::{
    APP_OFFLINE_FILE, AdmissionGate, FileOfflineResponder, GateBuilder, HOST_NOT_RUNNING_BODY,
    HostHooks, HostResponse, HttpContext, Identity, Next, NoopHooks, OfflineResponder, Principal,
    RequestId, TraceDescriptor, TraceKind, TraceRecord, TraceSink, TracingSink, format_identities,
    is_admin_request,
};
pub use host::{HealthFlag, HostHealth, HostState, ReadinessTracker};
pub use specialization::{
    SpecializationCoordinator, SpecializationState, Specializer, StandbyEnvironment,
    spawn_detached,
};
pub use subscribers::{EventMatcher, LogWriter, Subscribe, SubscriberSet, SubscriptionHandle};
pub use telemetry::init_tracing;
pub use worker::{
    ConsoleLine, ConsoleLog, ConsoleStream, INTENTIONAL_EXIT_CODE, OsProcessFactory,
    ProcessControl, ProcessFactory, ProcessHandle, WorkerContext, WorkerDescriptor,
    WorkerProcessSupervisor, process_pair,
};
