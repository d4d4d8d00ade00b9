//! Admission gate: the per-request entry point.
//!
//! - [`AdmissionGate`] / [`GateBuilder`]: readiness gating, specialization trigger, error mapping
//! - [`HttpContext`], [`HostResponse`], [`Principal`]: request-scoped data
//! - [`TraceRecord`], [`TraceSink`]: structured start/end and diagnostic traces
//! - [`Next`], [`HostHooks`], [`OfflineResponder`]: external collaborators

mod admission;
mod context;
mod hooks;
mod trace;

pub use admission::{AdmissionGate, GateBuilder, HOST_NOT_RUNNING_BODY};
pub use context::{
    HostResponse, HttpContext, Identity, Principal, RequestId, format_identities,
    is_admin_request,
};
pub use hooks::{APP_OFFLINE_FILE, FileOfflineResponder, HostHooks, Next, NoopHooks, OfflineResponder};
pub use trace::{TraceDescriptor, TraceKind, TraceRecord, TraceSink, TracingSink};
