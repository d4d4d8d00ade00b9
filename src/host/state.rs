//! # Host state and the delegated health signal.

use std::sync::atomic::{AtomicBool, Ordering};

/// Readiness state of the function host.
///
/// `Offline` and `Standby` are pre-specialization; `Running` means specialization
/// completed and the inner execution host reported healthy at least once.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostState {
    /// Host is offline (application taken offline or fatal host failure).
    Offline = 0,
    /// Pre-specialization placeholder host.
    Standby = 1,
    /// Specialized host, able to invoke functions if healthy.
    Running = 2,
}

impl HostState {
    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            1 => HostState::Standby,
            2 => HostState::Running,
            _ => HostState::Offline,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            HostState::Offline => "offline",
            HostState::Standby => "standby",
            HostState::Running => "running",
        }
    }
}

/// Last-reported health of the inner execution host.
///
/// Implementations must answer from already-observed state (no I/O): the
/// tracker calls this on every readiness check.
pub trait HostHealth: Send + Sync + 'static {
    /// True if the inner host last reported itself healthy.
    fn is_healthy(&self) -> bool;
}

/// Health signal backed by an atomic flag, written by the host-health path.
#[derive(Debug, Default)]
pub struct HealthFlag(AtomicBool);

impl HealthFlag {
    /// Creates a flag with the given initial value.
    pub fn new(healthy: bool) -> Self {
        Self(AtomicBool::new(healthy))
    }

    /// Records the latest health report.
    pub fn set(&self, healthy: bool) {
        self.0.store(healthy, Ordering::Release);
    }
}

impl HostHealth for HealthFlag {
    fn is_healthy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trips_through_u8() {
        for s in [HostState::Offline, HostState::Standby, HostState::Running] {
            assert_eq!(HostState::from_u8(s as u8), s);
        }
        assert_eq!(HostState::from_u8(200), HostState::Offline);
    }

    #[test]
    fn test_health_flag() {
        let flag = HealthFlag::new(false);
        assert!(!flag.is_healthy());
        flag.set(true);
        assert!(flag.is_healthy());
    }
}
