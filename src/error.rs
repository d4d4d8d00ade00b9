//! Error types used by the admission gate and the worker supervisors.
//!
//! This module defines two main error enums:
//!
//! - [`HostError`]: errors surfacing through the request pipeline.
//! - [`WorkerError`]: errors raised while starting or controlling a worker process.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.
//! [`HostError`] additionally exposes the two facts the gate branches on:
//! [`HostError::is_function_invocation`] and [`HostError::explicit_status`].

use http::StatusCode;
use thiserror::Error;

/// # Errors surfacing through the request pipeline.
///
/// One tagged type replaces the "generic vs. status-carrying" exception split:
/// the gate pattern-matches it exactly once in its error path.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum HostError {
    /// Failure raised inside user function code.
    ///
    /// Owned and logged by the execution layer; the gate must not log it again.
    #[error("function invocation failed: {message}")]
    FunctionInvocation {
        /// The underlying error message.
        message: String,
    },

    /// Host error carrying an explicit HTTP status for the response.
    #[error("http error {status}: {message}")]
    Http {
        /// Status code to send instead of the default 500.
        status: StatusCode,
        /// The underlying error message.
        message: String,
    },

    /// Specialization out of standby mode failed.
    #[error("specialization failed: {message}")]
    Specialization {
        /// The underlying error message.
        message: String,
    },

    /// Downstream handler panicked.
    #[error("downstream handler panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },

    /// Any other infrastructure failure.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl HostError {
    /// Builds a [`HostError::FunctionInvocation`].
    pub fn function_invocation(message: impl Into<String>) -> Self {
        HostError::FunctionInvocation {
            message: message.into(),
        }
    }

    /// Builds a [`HostError::Http`] carrying `status`.
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        HostError::Http {
            status,
            message: message.into(),
        }
    }

    /// Builds a [`HostError::Internal`] from a plain message.
    pub fn internal(message: impl Into<String>) -> Self {
        HostError::Internal(anyhow::anyhow!(message.into()))
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use hostvisor::HostError;
    ///
    /// let err = HostError::function_invocation("boom");
    /// assert_eq!(err.as_label(), "function_invocation");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            HostError::FunctionInvocation { .. } => "function_invocation",
            HostError::Http { .. } => "host_http",
            HostError::Specialization { .. } => "host_specialization",
            HostError::Panicked { .. } => "host_panicked",
            HostError::Internal(_) => "host_internal",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            HostError::FunctionInvocation { message } => format!("function: {message}"),
            HostError::Http { status, message } => format!("status={status}: {message}"),
            HostError::Specialization { message } => format!("specialization: {message}"),
            HostError::Panicked { info } => format!("panic: {info}"),
            HostError::Internal(e) => format!("internal: {e:#}"),
        }
    }

    /// True if the error originated in user code (already logged elsewhere).
    pub fn is_function_invocation(&self) -> bool {
        matches!(self, HostError::FunctionInvocation { .. })
    }

    /// Explicit status code carried by the error, if any.
    ///
    /// # Example
    /// ```
    /// use http::StatusCode;
    /// use hostvisor::HostError;
    ///
    /// let err = HostError::http(StatusCode::BAD_GATEWAY, "upstream");
    /// assert_eq!(err.explicit_status(), Some(StatusCode::BAD_GATEWAY));
    /// assert_eq!(HostError::internal("x").explicit_status(), None);
    /// ```
    pub fn explicit_status(&self) -> Option<StatusCode> {
        match self {
            HostError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// # Errors produced while controlling worker processes.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WorkerError {
    /// A live process already exists for this worker id.
    #[error("worker {worker_id} already has a live process")]
    AlreadyRunning {
        /// The worker id.
        worker_id: String,
    },

    /// The OS-level start call failed.
    #[error("failed to spawn worker {worker_id}: {source}")]
    Spawn {
        /// The worker id.
        worker_id: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// No live process exists for this worker id.
    #[error("worker {worker_id} is not running")]
    NotRunning {
        /// The worker id.
        worker_id: String,
    },
}

impl WorkerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerError::AlreadyRunning { .. } => "worker_already_running",
            WorkerError::Spawn { .. } => "worker_spawn_failed",
            WorkerError::NotRunning { .. } => "worker_not_running",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            WorkerError::AlreadyRunning { worker_id } => format!("already running: {worker_id}"),
            WorkerError::Spawn { worker_id, source } => format!("spawn {worker_id}: {source}"),
            WorkerError::NotRunning { worker_id } => format!("not running: {worker_id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_http_errors_carry_status() {
        assert_eq!(
            HostError::http(StatusCode::BAD_GATEWAY, "x").explicit_status(),
            Some(StatusCode::BAD_GATEWAY)
        );
        assert_eq!(HostError::function_invocation("x").explicit_status(), None);
        assert_eq!(HostError::internal("x").explicit_status(), None);
    }

    #[test]
    fn test_function_invocation_is_tagged() {
        assert!(HostError::function_invocation("x").is_function_invocation());
        assert!(!HostError::internal("x").is_function_invocation());
        assert!(!HostError::http(StatusCode::CONFLICT, "x").is_function_invocation());
    }

    #[test]
    fn test_internal_wraps_anyhow_transparently() {
        let err: HostError = anyhow::anyhow!("disk gone").into();
        assert_eq!(err.to_string(), "disk gone");
        assert_eq!(err.as_label(), "host_internal");
    }

    #[test]
    fn test_worker_labels() {
        let err = WorkerError::NotRunning {
            worker_id: "w1".into(),
        };
        assert_eq!(err.as_label(), "worker_not_running");
        assert_eq!(err.as_message(), "not running: w1");
    }
}
