//! Host readiness: state machine and delegated health.
//!
//! - [`HostState`]: `Offline` / `Standby` / `Running`
//! - [`HostHealth`]: last-reported health of the inner execution host (external)
//! - [`ReadinessTracker`]: lock-free state reads and the bounded wait-for-ready primitive

mod readiness;
mod state;

pub use readiness::ReadinessTracker;
pub use state::{HealthFlag, HostHealth, HostState};
