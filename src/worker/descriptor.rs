//! # Worker descriptor and per-spawn context.

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Immutable description of one supervised worker.
///
/// ## Example
/// ```rust
/// use hostvisor::WorkerDescriptor;
///
/// let d = WorkerDescriptor::new("node-1", "node", "/home/site/wwwroot", 8080)
///     .with_args(["worker.js"])
///     .with_env("NODE_ENV", "production");
/// assert_eq!(d.arguments, vec!["worker.js".to_string()]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerDescriptor {
    /// Unique id of the supervised process.
    pub worker_id: String,
    /// Executable path (from external configuration).
    pub executable: PathBuf,
    /// Arguments passed to the executable.
    pub arguments: Vec<String>,
    /// Working directory; the script root.
    pub working_directory: PathBuf,
    /// Port the worker must listen on.
    pub port: u16,
    /// Extra environment variables, in key order.
    pub environment: BTreeMap<String, String>,
}

impl WorkerDescriptor {
    /// Creates a descriptor without arguments or extra environment.
    pub fn new(
        worker_id: impl Into<String>,
        executable: impl Into<PathBuf>,
        working_directory: impl Into<PathBuf>,
        port: u16,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            executable: executable.into(),
            arguments: Vec::new(),
            working_directory: working_directory.into(),
            port,
            environment: BTreeMap::new(),
        }
    }

    /// Appends arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(args.into_iter().map(Into::into));
        self
    }

    /// Adds one environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    /// Builds the context of one spawn, injecting the port variable.
    pub(crate) fn context(&self, port_env_var: &str) -> WorkerContext {
        let mut environment = self.environment.clone();
        environment.insert(port_env_var.to_string(), self.port.to_string());
        WorkerContext {
            context_id: uuid::Uuid::new_v4().to_string(),
            worker_id: self.worker_id.clone(),
            executable: self.executable.clone(),
            arguments: self.arguments.clone(),
            working_directory: self.working_directory.clone(),
            port: self.port,
            environment,
        }
    }
}

/// Everything a [`ProcessFactory`](crate::ProcessFactory) needs for one start.
#[derive(Clone, Debug)]
pub struct WorkerContext {
    /// Fresh id of this spawn (diagnostics only).
    pub context_id: String,
    pub worker_id: String,
    pub executable: PathBuf,
    pub arguments: Vec<String>,
    pub working_directory: PathBuf,
    pub port: u16,
    /// Final environment, port variable included.
    pub environment: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_injects_port_variable() {
        let d = WorkerDescriptor::new("w1", "/usr/bin/python3", "/srv/app", 7071)
            .with_args(["-m", "worker"])
            .with_env("A", "1");
        let ctx = d.context("FUNCTIONS_HTTPWORKER_PORT");

        assert_eq!(ctx.environment.get("FUNCTIONS_HTTPWORKER_PORT").map(String::as_str), Some("7071"));
        assert_eq!(ctx.environment.get("A").map(String::as_str), Some("1"));
        assert_eq!(ctx.working_directory, PathBuf::from("/srv/app"));
        assert_eq!(ctx.arguments, vec!["-m".to_string(), "worker".to_string()]);
        assert!(!d.environment.contains_key("FUNCTIONS_HTTPWORKER_PORT"));
    }

    #[test]
    fn test_each_context_gets_fresh_id() {
        let d = WorkerDescriptor::new("w1", "x", ".", 1);
        assert_ne!(d.context("P").context_id, d.context("P").context_id);
    }
}
