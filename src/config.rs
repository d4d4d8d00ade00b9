//! # Host configuration.
//!
//! Provides [`HostConfig`], the centralized settings for the admission gate,
//! the readiness tracker and the worker supervisors. Loading it (files, env,
//! options monitors) is the embedder's job; this crate only consumes it.
//!
//! ## Sentinel values
//! - `drain_timeout = 0s` → the drain wait is unbounded
//! - `bus_capacity` and `console_buffer_lines` are clamped to a minimum of 1

use std::path::PathBuf;
use std::time::Duration;

/// Global configuration for the host admission layer.
///
/// ## Field semantics
/// - `readiness_timeout`: upper bound of a single readiness wait
/// - `readiness_poll_interval`: how often a waiting request re-checks readiness
/// - `drain_timeout`: upper bound of the drain suspension (`0s` = unbounded)
/// - `check_environment`: consult the drain condition at all
/// - `script_path`: script root, handed to the offline responder and used as worker cwd
/// - `request_id_header`: inbound correlation header
/// - `admin_path_prefix`: path prefix of privileged requests (bypass readiness)
/// - `bus_capacity`: capacity of the event bus tap channel
/// - `port_env_var`: environment variable that tells a worker its port
/// - `console_buffer_lines`: per-worker console ring size
#[derive(Clone, Debug)]
pub struct HostConfig {
    /// Maximum time a request waits for the host to become invokable.
    pub readiness_timeout: Duration,

    /// Interval between readiness re-checks while waiting.
    ///
    /// Waiters also wake up immediately on state/health notifications.
    pub readiness_poll_interval: Duration,

    /// Maximum time a request waits for a drain condition to clear.
    pub drain_timeout: Duration,

    /// Whether the runtime environment may signal a drain condition.
    pub check_environment: bool,

    /// Script root of the function application.
    pub script_path: PathBuf,

    /// Header carrying an inbound correlation id.
    pub request_id_header: String,

    /// Path prefix identifying administrative requests.
    pub admin_path_prefix: String,

    /// Capacity of the event bus tap channel.
    pub bus_capacity: usize,

    /// Environment variable that communicates the assigned port to a worker.
    pub port_env_var: String,

    /// Number of console lines kept per worker.
    pub console_buffer_lines: usize,
}

impl HostConfig {
    /// Returns the drain bound as an `Option`.
    ///
    /// - `None` → wait until the condition clears
    /// - `Some(d)` → give up waiting after `d`
    #[inline]
    pub fn drain_limit(&self) -> Option<Duration> {
        if self.drain_timeout == Duration::ZERO {
            None
        } else {
            Some(self.drain_timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns a console buffer size clamped to a minimum of 1.
    #[inline]
    pub fn console_lines_clamped(&self) -> usize {
        self.console_buffer_lines.max(1)
    }
}

impl Default for HostConfig {
    /// Default configuration:
    ///
    /// - `readiness_timeout = 15s`
    /// - `readiness_poll_interval = 250ms`
    /// - `drain_timeout = 0s` (unbounded)
    /// - `check_environment = false`
    /// - `script_path = "."`
    /// - `request_id_header = "x-ms-request-id"`
    /// - `admin_path_prefix = "/admin"`
    /// - `bus_capacity = 1024`
    /// - `port_env_var = "FUNCTIONS_HTTPWORKER_PORT"`
    /// - `console_buffer_lines = 1000`
    fn default() -> Self {
        Self {
            readiness_timeout: Duration::from_secs(15),
            readiness_poll_interval: Duration::from_millis(250),
            drain_timeout: Duration::ZERO,
            check_environment: false,
            script_path: PathBuf::from("."),
            request_id_header: "x-ms-request-id".to_string(),
            admin_path_prefix: "/admin".to_string(),
            bus_capacity: 1024,
            port_env_var: "FUNCTIONS_HTTPWORKER_PORT".to_string(),
            console_buffer_lines: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_drain_timeout_is_unbounded() {
        let mut cfg = HostConfig::default();
        assert_eq!(cfg.drain_limit(), None);
        cfg.drain_timeout = Duration::from_secs(3);
        assert_eq!(cfg.drain_limit(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_capacities_are_clamped() {
        let cfg = HostConfig {
            bus_capacity: 0,
            console_buffer_lines: 0,
            ..HostConfig::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
        assert_eq!(cfg.console_lines_clamped(), 1);
    }
}
