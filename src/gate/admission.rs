//! # AdmissionGate: per-request entry point.
//!
//! ## Flow
//! ```text
//! handle(ctx)
//!   ├─ assign request id (correlation header or uuid v4) → request extensions
//!   ├─ emit RequestStarted
//!   ├─ process(ctx):
//!   │    ├─ hooks.synchronize_host_name
//!   │    ├─ drain wait (check_environment && delay_requests_enabled)
//!   │    ├─ coordinator.ensure_specialized()        (only until Done)
//!   │    ├─ (Offline || !can_invoke) && !admin ──► verify_availability()
//!   │    │       ├─ Offline     → offline responder, stop
//!   │    │       └─ not ready   → delay_until_host_ready(timeout)
//!   │    │                          ├─ ready   → continue
//!   │    │                          └─ expired → 503 "Function host is not running.", stop
//!   │    ├─ hooks.apply_features + next.run(ctx)    (panics caught)
//!   │    └─ DuplicateHeadersRemoved (if noted)
//!   ├─ on error:
//!   │    ├─ not a function-invocation error → UnhandledHostError
//!   │    ├─ response started → ResponseStarted, return Err
//!   │    └─ else status = explicit status or 500, absorbed
//!   └─ emit RequestCompleted (every path)
//! ```
//!
//! ## Rules
//! - No lock is taken on the request path; host state is read atomically.
//! - The readiness wait is the only bounded suspension; on expiry just this
//!   request fails with 503.
//! - A request's own cancellation (dropping the `handle` future) never reaches
//!   the specialization unit.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use http::StatusCode;
use http::header::USER_AGENT;
use tracing::{Instrument, debug, warn};

use super::context::{HttpContext, RequestId, format_identities, is_admin_request};
use super::hooks::{FileOfflineResponder, HostHooks, Next, NoopHooks, OfflineResponder};
use super::trace::{TraceRecord, TraceSink, TracingSink};
use crate::config::HostConfig;
use crate::error::HostError;
use crate::host::{HostState, ReadinessTracker};
use crate::specialization::SpecializationCoordinator;
use crate::subscribers::panic_message;

/// Body of the 503 response after a failed readiness check.
pub const HOST_NOT_RUNNING_BODY: &str = "Function host is not running.";

/// Gates inbound requests against host readiness and specialization.
pub struct AdmissionGate {
    cfg: HostConfig,
    readiness: Arc<ReadinessTracker>,
    specialization: Arc<SpecializationCoordinator>,
    next: Arc<dyn Next>,
    hooks: Arc<dyn HostHooks>,
    offline: Arc<dyn OfflineResponder>,
    sink: Arc<dyn TraceSink>,
}

/// Builder for [`AdmissionGate`].
///
/// Readiness tracker, specialization coordinator and downstream chain are
/// required; hooks, offline responder and trace sink have defaults
/// ([`NoopHooks`], [`FileOfflineResponder`], [`TracingSink`]).
pub struct GateBuilder {
    cfg: HostConfig,
    readiness: Option<Arc<ReadinessTracker>>,
    specialization: Option<Arc<SpecializationCoordinator>>,
    next: Option<Arc<dyn Next>>,
    hooks: Arc<dyn HostHooks>,
    offline: Arc<dyn OfflineResponder>,
    sink: Arc<dyn TraceSink>,
}

impl GateBuilder {
    pub fn new(cfg: HostConfig) -> Self {
        Self {
            cfg,
            readiness: None,
            specialization: None,
            next: None,
            hooks: Arc::new(NoopHooks),
            offline: Arc::new(FileOfflineResponder),
            sink: Arc::new(TracingSink),
        }
    }

    pub fn with_readiness(mut self, readiness: Arc<ReadinessTracker>) -> Self {
        self.readiness = Some(readiness);
        self
    }

    pub fn with_specialization(mut self, coordinator: Arc<SpecializationCoordinator>) -> Self {
        self.specialization = Some(coordinator);
        self
    }

    /// Sets the downstream handler chain.
    pub fn with_next(mut self, next: Arc<dyn Next>) -> Self {
        self.next = Some(next);
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn HostHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_offline_responder(mut self, offline: Arc<dyn OfflineResponder>) -> Self {
        self.offline = offline;
        self
    }

    pub fn with_trace_sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Builds the gate.
    ///
    /// # Errors
    /// [`HostError::Internal`] naming the first missing required component.
    pub fn build(self) -> Result<Arc<AdmissionGate>, HostError> {
        let readiness = self
            .readiness
            .ok_or_else(|| HostError::internal("admission gate requires a readiness tracker"))?;
        let specialization = self.specialization.ok_or_else(|| {
            HostError::internal("admission gate requires a specialization coordinator")
        })?;
        let next = self
            .next
            .ok_or_else(|| HostError::internal("admission gate requires a downstream handler"))?;

        Ok(Arc::new(AdmissionGate {
            cfg: self.cfg,
            readiness,
            specialization,
            next,
            hooks: self.hooks,
            offline: self.offline,
            sink: self.sink,
        }))
    }
}

impl AdmissionGate {
    pub fn builder(cfg: HostConfig) -> GateBuilder {
        GateBuilder::new(cfg)
    }

    /// Handles one request.
    ///
    /// Infrastructure errors are absorbed into the response status; `Err` is
    /// returned only when the error happened after the response started.
    pub async fn handle(&self, ctx: &mut HttpContext) -> Result<(), HostError> {
        let request_id = self.assign_request_id(ctx);
        let started = Instant::now();

        let user_agent = ctx
            .request
            .headers()
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        self.sink.emit(TraceRecord::RequestStarted {
            request_id: request_id.to_string(),
            method: ctx.request.method().to_string(),
            path: ctx.request.uri().path().to_string(),
            user_agent,
        });

        let outcome = match self.process(ctx, &request_id).await {
            Ok(()) => Ok(()),
            Err(err) => self.on_error(ctx, &request_id, err),
        };

        self.sink.emit(TraceRecord::RequestCompleted {
            request_id: request_id.to_string(),
            identities: format_identities(&ctx.user),
            status: ctx.response.status().as_u16(),
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        });
        outcome
    }

    fn assign_request_id(&self, ctx: &mut HttpContext) -> RequestId {
        let id = ctx
            .request
            .headers()
            .get(self.cfg.request_id_header.as_str())
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let id = RequestId(id);
        ctx.request.extensions_mut().insert(id.clone());
        id
    }

    async fn process(&self, ctx: &mut HttpContext, request_id: &RequestId) -> Result<(), HostError> {
        self.hooks.synchronize_host_name(&ctx.request);

        if self.cfg.check_environment && self.hooks.delay_requests_enabled() {
            self.wait_for_drain(request_id).await;
        }

        if !self.specialization.is_specialized() {
            self.specialization.ensure_specialized().await?;
        }

        let unready = self.readiness.state() == HostState::Offline || !self.readiness.can_invoke();
        let proceed = if unready && !is_admin_request(&ctx.request, &self.cfg.admin_path_prefix) {
            self.verify_availability(ctx, request_id).await?
        } else {
            true
        };

        if proceed {
            self.hooks.apply_features(ctx);
            match AssertUnwindSafe(self.next.run(ctx)).catch_unwind().await {
                Ok(res) => res?,
                Err(payload) => {
                    return Err(HostError::Panicked {
                        info: panic_message(payload.as_ref()),
                    });
                }
            }
        }

        if let Some(keys) = ctx.duplicate_headers.take() {
            self.sink.emit(TraceRecord::DuplicateHeadersRemoved {
                request_id: request_id.to_string(),
                keys,
            });
        }
        Ok(())
    }

    async fn wait_for_drain(&self, request_id: &RequestId) {
        debug!(request_id = %request_id, "holding request until drain completes");
        match self.cfg.drain_limit() {
            None => self.hooks.delay_completion().await,
            Some(limit) => {
                if tokio::time::timeout(limit, self.hooks.delay_completion())
                    .await
                    .is_err()
                {
                    warn!(
                        request_id = %request_id,
                        limit_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                        "drain wait elapsed, continuing"
                    );
                }
            }
        }
    }

    /// Returns whether processing may continue.
    async fn verify_availability(
        &self,
        ctx: &mut HttpContext,
        request_id: &RequestId,
    ) -> Result<bool, HostError> {
        if self.readiness.state() == HostState::Offline {
            self.offline
                .respond(&mut ctx.response, &self.cfg.script_path)
                .await?;
            return Ok(false);
        }
        if self.readiness.can_invoke() {
            return Ok(true);
        }

        let span = tracing::info_span!("host_availability_check", request_id = %request_id);
        async {
            self.sink.emit(TraceRecord::InitiatingHostAvailabilityCheck {
                request_id: request_id.to_string(),
            });
            if !self
                .readiness
                .delay_until_host_ready(self.cfg.readiness_timeout)
                .await
            {
                self.sink.emit(TraceRecord::HostUnavailableAfterCheck {
                    request_id: request_id.to_string(),
                });
                ctx.response.set_status(StatusCode::SERVICE_UNAVAILABLE);
                ctx.response.write_body(HOST_NOT_RUNNING_BODY);
                return Ok(false);
            }
            self.sink.emit(TraceRecord::HostAvailabilityCheckSucceeded {
                request_id: request_id.to_string(),
            });
            Ok(true)
        }
        .instrument(span)
        .await
    }

    fn on_error(
        &self,
        ctx: &mut HttpContext,
        request_id: &RequestId,
        err: HostError,
    ) -> Result<(), HostError> {
        if !err.is_function_invocation() {
            self.sink.emit(TraceRecord::UnhandledHostError {
                request_id: request_id.to_string(),
                label: err.as_label(),
                error: err.as_message(),
            });
        }

        if ctx.response.has_started() {
            self.sink.emit(TraceRecord::ResponseStarted {
                request_id: request_id.to_string(),
            });
            return Err(err);
        }

        let status = err
            .explicit_status()
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        ctx.response.set_status(status);
        Ok(())
    }
}

impl std::fmt::Debug for AdmissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionGate")
            .field("host_state", &self.readiness.state())
            .field("specialization", &self.specialization.state())
            .finish()
    }
}
