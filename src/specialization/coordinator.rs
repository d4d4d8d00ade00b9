//! # SpecializationCoordinator: exactly-once exit from standby mode.
//!
//! ## Flow
//! ```text
//! ensure_specialized()
//!   ├─ state == Done ───────────────────────────────► Ok (lock-free fast path)
//!   ├─ CAS NotStarted → InProgress fails ───────────► Ok (loser, does not wait)
//!   └─ winner:
//!        ├─ in standby mode or container not ready ─► state = NotStarted, Ok (retry later)
//!        └─ spawn_detached("specialization"):
//!              ├─ specializer.specialize_host(host child token)
//!              ├─ Ok  → state = Done, notify waiters, publish Specialized
//!              └─ Err → state = NotStarted, Err
//!           winner awaits the unit's JoinHandle
//! ```
//!
//! ## Rules
//! - At most one specialization unit ever runs at a time, and at most one succeeds.
//! - The unit finalizes the state itself, so a winner whose request is dropped
//!   mid-wait still leaves the coordinator `Done`.
//! - Losers needing completion use [`SpecializationCoordinator::wait_specialized`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::detached::spawn_detached;
use crate::error::HostError;
use crate::events::{Event, EventBus};
use crate::subscribers::panic_message;

/// Progress of the one-time specialization.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecializationState {
    NotStarted = 0,
    InProgress = 1,
    Done = 2,
}

impl SpecializationState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => SpecializationState::InProgress,
            2 => SpecializationState::Done,
            _ => SpecializationState::NotStarted,
        }
    }
}

/// Preconditions reported by the runtime environment.
pub trait StandbyEnvironment: Send + Sync + 'static {
    /// True while the host still serves the placeholder identity.
    fn in_standby_mode(&self) -> bool;

    /// True once container/runtime dependencies are ready.
    fn is_container_ready(&self) -> bool;
}

/// Performs the actual transition into a tenant-specialized host.
#[async_trait]
pub trait Specializer: Send + Sync + 'static {
    /// Specializes the host. `ctx` is cancelled only on host shutdown.
    async fn specialize_host(&self, ctx: CancellationToken) -> Result<(), HostError>;
}

struct Shared {
    state: AtomicU8,
    done: Notify,
}

impl Shared {
    fn load(&self) -> SpecializationState {
        SpecializationState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn store(&self, s: SpecializationState) {
        self.state.store(s as u8, Ordering::Release);
    }
}

/// Drives the exactly-once, context-isolated transition out of standby.
pub struct SpecializationCoordinator {
    shared: Arc<Shared>,
    env: Arc<dyn StandbyEnvironment>,
    specializer: Arc<dyn Specializer>,
    bus: EventBus,
    host_token: CancellationToken,
}

impl SpecializationCoordinator {
    /// Creates a coordinator.
    ///
    /// A host that is not in standby mode at construction never specializes and
    /// starts out `Done`. `host_token` is the host-lifetime token handed (as a
    /// child) to the specialization unit.
    pub fn new(
        env: Arc<dyn StandbyEnvironment>,
        specializer: Arc<dyn Specializer>,
        bus: EventBus,
        host_token: CancellationToken,
    ) -> Self {
        let initial = if env.in_standby_mode() {
            SpecializationState::NotStarted
        } else {
            SpecializationState::Done
        };
        Self {
            shared: Arc::new(Shared {
                state: AtomicU8::new(initial as u8),
                done: Notify::new(),
            }),
            env,
            specializer,
            bus,
            host_token,
        }
    }

    /// Current state.
    #[inline]
    pub fn state(&self) -> SpecializationState {
        self.shared.load()
    }

    /// True once specialization completed (or was never needed).
    #[inline]
    pub fn is_specialized(&self) -> bool {
        self.state() == SpecializationState::Done
    }

    /// Specializes the host if this caller wins the race and preconditions hold.
    ///
    /// Only the winner suspends (until the detached unit finishes); every other
    /// caller returns immediately.
    pub async fn ensure_specialized(&self) -> Result<(), HostError> {
        if self.is_specialized() {
            return Ok(());
        }
        if self
            .shared
            .state
            .compare_exchange(
                SpecializationState::NotStarted as u8,
                SpecializationState::InProgress as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return Ok(());
        }

        if self.env.in_standby_mode() || !self.env.is_container_ready() {
            self.shared.store(SpecializationState::NotStarted);
            debug!("specialization deferred: standby mode active or container not ready");
            return Ok(());
        }

        let shared = Arc::clone(&self.shared);
        let specializer = Arc::clone(&self.specializer);
        let bus = self.bus.clone();
        let unit = spawn_detached("specialization", &self.host_token, move |ctx| async move {
            info!("specializing host");
            let res = std::panic::AssertUnwindSafe(specializer.specialize_host(ctx))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(HostError::Specialization {
                        message: panic_message(panic.as_ref()),
                    })
                });
            match res {
                Ok(()) => {
                    shared.store(SpecializationState::Done);
                    shared.done.notify_waiters();
                    bus.publish(Event::specialized());
                    info!("host specialized");
                    Ok(())
                }
                Err(e) => {
                    shared.store(SpecializationState::NotStarted);
                    error!(error = %e, label = e.as_label(), "host specialization failed");
                    Err(e)
                }
            }
        });

        match unit.await {
            Ok(res) => res,
            Err(join) => {
                self.shared.store(SpecializationState::NotStarted);
                Err(HostError::Specialization {
                    message: join.to_string(),
                })
            }
        }
    }

    /// Waits until specialization is `Done`, at most `timeout`.
    pub async fn wait_specialized(&self, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.shared.done.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if self.is_specialized() {
                    return true;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.unwrap_or(false)
    }
}
