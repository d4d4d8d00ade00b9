//! # Example: gate_readiness
//!
//! A pre-warmed placeholder host gets assigned to a tenant and serves its
//! first request.
//!
//! Shows how to:
//! - Wire an [`AdmissionGate`] to a [`ReadinessTracker`] and a [`SpecializationCoordinator`].
//! - Let the first request after assignment trigger specialization.
//! - Observe a 503 once the readiness wait runs out on an unhealthy host.
//!
//! ## Flow
//! ```text
//! container assigned (standby = false)
//! GET /api/hello ──► AdmissionGate::handle()
//!     ├─► ensure_specialized() ──► detached Specializer (≈300ms) ──► state = Running
//!     ├─► can_invoke() ──► true
//!     └─► Next::run() ──► 200 "hello"
//!
//! health = false ──► GET /api/hello ──► delay_until_host_ready() elapses ──► 503
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example gate_readiness
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use hostvisor::{
    AdmissionGate, EventBus, HealthFlag, HostConfig, HostError, HostState, HttpContext, LogWriter,
    Next, ReadinessTracker, SpecializationCoordinator, Specializer, StandbyEnvironment,
};
use tokio_util::sync::CancellationToken;

/// Placeholder environment; leaves standby when a tenant is assigned.
struct Placeholder {
    standby: AtomicBool,
}

impl StandbyEnvironment for Placeholder {
    fn in_standby_mode(&self) -> bool {
        self.standby.load(Ordering::Acquire)
    }

    fn is_container_ready(&self) -> bool {
        true
    }
}

/// Pretends to load the tenant's application, then marks the host running.
struct LoadTenant {
    readiness: Arc<ReadinessTracker>,
}

#[async_trait]
impl Specializer for LoadTenant {
    async fn specialize_host(&self, ctx: CancellationToken) -> Result<(), HostError> {
        tokio::select! {
            _ = ctx.cancelled() => return Err(HostError::internal("host shutting down")),
            _ = tokio::time::sleep(Duration::from_millis(300)) => {}
        }
        self.readiness.set_state(HostState::Running);
        Ok(())
    }
}

struct Hello;

#[async_trait]
impl Next for Hello {
    async fn run(&self, ctx: &mut HttpContext) -> Result<(), HostError> {
        ctx.response.write_body("hello");
        Ok(())
    }
}

fn get(path: &str) -> anyhow::Result<HttpContext> {
    Ok(HttpContext::new(http::Request::get(path).body(())?))
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    hostvisor::init_tracing();

    let mut cfg = HostConfig::default();
    cfg.readiness_timeout = Duration::from_secs(2);

    let bus = EventBus::new(cfg.bus_capacity_clamped());
    let _log = bus.subscribe_all(Arc::new(LogWriter::new()));

    let health = Arc::new(HealthFlag::new(true));
    let readiness = Arc::new(ReadinessTracker::new(
        HostState::Standby,
        health.clone(),
        cfg.readiness_poll_interval,
    ));
    let env = Arc::new(Placeholder {
        standby: AtomicBool::new(true),
    });
    let host_token = CancellationToken::new();
    let coordinator = Arc::new(SpecializationCoordinator::new(
        env.clone(),
        Arc::new(LoadTenant {
            readiness: readiness.clone(),
        }),
        bus.clone(),
        host_token.clone(),
    ));

    let gate = AdmissionGate::builder(cfg)
        .with_readiness(readiness.clone())
        .with_specialization(coordinator.clone())
        .with_next(Arc::new(Hello))
        .build()?;

    env.standby.store(false, Ordering::Release);
    let mut first = get("/api/hello")?;
    gate.handle(&mut first).await?;
    println!(
        "first request: {} {:?} (specialized: {})",
        first.response.status(),
        String::from_utf8_lossy(first.response.body()),
        coordinator.is_specialized()
    );

    health.set(false);
    readiness.notify_health_changed();

    let mut second = get("/api/hello")?;
    gate.handle(&mut second).await?;
    println!(
        "unhealthy host: {} {:?}",
        second.response.status(),
        String::from_utf8_lossy(second.response.body())
    );

    host_token.cancel();
    bus.shutdown().await;
    Ok(())
}
