//! # OS process binding (`tokio::process`).
//!
//! ```text
//! create(ctx)
//!   ├─ Command { program, args, cwd, env, piped stdout/stderr, kill_on_drop }
//!   ├─ spawn()            ← returns here, never waits for the child
//!   ├─ tokio::spawn(drain stdout) / tokio::spawn(drain stderr)
//!   └─ tokio::spawn(watch_child):
//!         select! {
//!           child.wait()          → join drains (≤ CONSOLE_FLUSH_GRACE),
//!                                   report_exit(code | 128 + signal)
//!           terminate_requested() → kill, report_exit(INTENTIONAL_EXIT_CODE)
//!         }
//! ```
//!
//! Joining the drains first means the console holds the child's last words by
//! the time the exit is observed. A grandchild that inherited the pipes can
//! keep them open; the grace bound stops that from delaying the report.

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::console::{ConsoleLog, ConsoleStream, drain};
use super::descriptor::WorkerContext;
use super::process::{INTENTIONAL_EXIT_CODE, ProcessControl, ProcessFactory, ProcessHandle, process_pair};
use crate::error::WorkerError;

/// Longest wait for the console drains once the child has exited.
pub const CONSOLE_FLUSH_GRACE: Duration = Duration::from_millis(500);

/// Starts workers as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsProcessFactory;

impl ProcessFactory for OsProcessFactory {
    fn create(
        &self,
        ctx: &WorkerContext,
        console: Arc<ConsoleLog>,
    ) -> Result<ProcessHandle, WorkerError> {
        let mut command = Command::new(&ctx.executable);
        command
            .args(&ctx.arguments)
            .current_dir(&ctx.working_directory)
            .envs(&ctx.environment)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|source| WorkerError::Spawn {
            worker_id: ctx.worker_id.clone(),
            source,
        })?;

        let (handle, control) = process_pair(child.id());
        let mut drains = Vec::with_capacity(2);
        if let Some(out) = child.stdout.take() {
            drains.push(tokio::spawn(drain(
                out,
                console.clone(),
                ConsoleStream::Stdout,
                ctx.worker_id.clone(),
            )));
        }
        if let Some(err) = child.stderr.take() {
            drains.push(tokio::spawn(drain(err, console, ConsoleStream::Stderr, ctx.worker_id.clone())));
        }
        tokio::spawn(watch_child(child, control, drains, ctx.worker_id.clone()));
        Ok(handle)
    }
}

async fn watch_child(
    mut child: Child,
    control: ProcessControl,
    drains: Vec<JoinHandle<()>>,
    worker_id: String,
) {
    let status = tokio::select! {
        status = child.wait() => Some(status),
        _ = control.terminate_requested() => None,
    };

    match status {
        Some(Ok(status)) => {
            if tokio::time::timeout(CONSOLE_FLUSH_GRACE, join_all(drains)).await.is_err() {
                debug!(worker_id = %worker_id, "console still open after exit, reporting anyway");
            }
            control.report_exit(exit_code(status));
        }
        Some(Err(e)) => warn!(worker_id = %worker_id, error = %e, "lost track of worker process"),
        None => {
            if let Err(e) = child.kill().await {
                warn!(worker_id = %worker_id, error = %e, "failed to kill worker process");
            }
            debug!(worker_id = %worker_id, "worker process terminated");
            control.report_exit(INTENTIONAL_EXIT_CODE);
        }
    }
}

/// Exit code of `status`; signal deaths map to `128 + signal` on Unix.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ctx(script: &str) -> WorkerContext {
        let mut environment = std::collections::BTreeMap::new();
        environment.insert("FUNCTIONS_HTTPWORKER_PORT".to_string(), "8081".to_string());
        WorkerContext {
            context_id: "ctx".into(),
            worker_id: "sh-worker".into(),
            executable: "sh".into(),
            arguments: vec!["-c".into(), script.into()],
            working_directory: std::env::temp_dir(),
            port: 8081,
            environment,
        }
    }

    async fn wait_for_line(console: &ConsoleLog, text: &str) -> bool {
        for _ in 0..200 {
            if console.snapshot().iter().any(|l| l.text == text) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_reports_exit_code_and_console() {
        let console = Arc::new(ConsoleLog::new(16));
        let handle = OsProcessFactory
            .create(&ctx("echo port=$FUNCTIONS_HTTPWORKER_PORT; echo oops >&2; exit 3"), console.clone())
            .unwrap();

        assert_eq!(handle.exited().await, Some(3));
        assert!(wait_for_line(&console, "port=8081").await);
        assert!(wait_for_line(&console, "oops").await);
        assert_eq!(console.last(ConsoleStream::Stderr).as_deref(), Some("oops"));
    }

    #[tokio::test]
    async fn test_invalid_utf8_and_heavy_output_do_not_kill_the_worker() {
        let console = Arc::new(ConsoleLog::new(16));
        let script = "printf 'bad \\377\\n'; \
                      i=0; while [ $i -lt 40000 ]; do echo line-$i; i=$((i+1)); done; \
                      exit 3";
        let handle = OsProcessFactory.create(&ctx(script), console.clone()).unwrap();

        assert_eq!(handle.exited().await, Some(3));
        assert_eq!(console.last(ConsoleStream::Stdout).as_deref(), Some("line-39999"));
        assert_eq!(console.dropped(), 40001 - 16);
    }

    #[tokio::test]
    async fn test_console_is_flushed_before_exit_is_reported() {
        for _ in 0..10 {
            let console = Arc::new(ConsoleLog::new(4));
            let handle = OsProcessFactory
                .create(&ctx("echo fatal-startup-error >&2; exit 2"), console.clone())
                .unwrap();

            assert_eq!(handle.exited().await, Some(2));
            assert_eq!(
                console.last(ConsoleStream::Stderr).as_deref(),
                Some("fatal-startup-error")
            );
        }
    }

    #[tokio::test]
    async fn test_signal_death_maps_to_128_plus_signal() {
        let console = Arc::new(ConsoleLog::new(4));
        let handle = OsProcessFactory.create(&ctx("kill -9 $$"), console).unwrap();
        assert_eq!(handle.exited().await, Some(137));
    }

    #[tokio::test]
    async fn test_terminate_reports_sentinel() {
        let console = Arc::new(ConsoleLog::new(4));
        let handle = OsProcessFactory.create(&ctx("sleep 30"), console).unwrap();
        handle.terminate();
        assert_eq!(handle.exited().await, Some(INTENTIONAL_EXIT_CODE));
    }

    #[tokio::test]
    async fn test_missing_executable_fails_to_spawn() {
        let mut c = ctx("");
        c.executable = "/definitely/not/here".into();
        let err = OsProcessFactory
            .create(&c, Arc::new(ConsoleLog::new(1)))
            .unwrap_err();
        assert_eq!(err.as_label(), "worker_spawn_failed");
    }
}
