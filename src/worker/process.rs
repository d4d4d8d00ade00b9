//! # Process handle abstraction.
//!
//! The OS binding is a collaborator behind [`ProcessFactory`]. Supervisors only
//! see a [`ProcessHandle`]: an awaitable exit notification plus `terminate()`.
//! The factory keeps the matching [`ProcessControl`] and reports the exit on it.
//!
//! ```text
//! ProcessFactory::create ──► process_pair()
//!                               ├─► ProcessHandle  (supervisor: exited() / terminate())
//!                               └─► ProcessControl (binding: report_exit() / terminate_requested())
//!                                        watch<Option<i32>> + CancellationToken
//! ```

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::console::ConsoleLog;
use super::descriptor::WorkerContext;
use crate::error::WorkerError;

/// Exit code reported for an orchestrated, intentional termination.
pub const INTENTIONAL_EXIT_CODE: i32 = -1;

/// Supervisor-side view of a running process. Cheap to clone.
#[derive(Clone, Debug)]
pub struct ProcessHandle {
    pid: Option<u32>,
    exit: watch::Receiver<Option<i32>>,
    terminate: CancellationToken,
}

impl ProcessHandle {
    /// OS process id, if known.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Exit code, if the process already exited.
    pub fn exit_code(&self) -> Option<i32> {
        *self.exit.borrow()
    }

    /// Waits for the exit notification (no polling).
    ///
    /// Returns `None` if the binding went away without reporting an exit.
    pub async fn exited(&self) -> Option<i32> {
        let mut rx = self.exit.clone();
        rx.wait_for(Option::is_some).await.map(|code| *code).ok().flatten()
    }

    /// Asks the binding to stop the process; it then exits with
    /// [`INTENTIONAL_EXIT_CODE`].
    pub fn terminate(&self) {
        self.terminate.cancel();
    }
}

/// Binding-side half of a process: reports the exit, observes termination requests.
#[derive(Debug)]
pub struct ProcessControl {
    exit: watch::Sender<Option<i32>>,
    terminate: CancellationToken,
}

impl ProcessControl {
    /// Reports the exit code. Only the first report counts.
    pub fn report_exit(&self, code: i32) {
        self.exit.send_if_modified(|slot| {
            if slot.is_none() {
                *slot = Some(code);
                true
            } else {
                false
            }
        });
    }

    /// Completes when the supervisor requested termination.
    pub async fn terminate_requested(&self) {
        self.terminate.cancelled().await;
    }

    pub fn is_terminate_requested(&self) -> bool {
        self.terminate.is_cancelled()
    }
}

/// Creates a connected handle/control pair.
pub fn process_pair(pid: Option<u32>) -> (ProcessHandle, ProcessControl) {
    let (tx, rx) = watch::channel(None);
    let terminate = CancellationToken::new();
    (
        ProcessHandle {
            pid,
            exit: rx,
            terminate: terminate.clone(),
        },
        ProcessControl {
            exit: tx,
            terminate,
        },
    )
}

/// Starts worker processes.
///
/// `create` must return as soon as the OS-level start call returns; exit
/// watching and console draining happen on background tasks.
pub trait ProcessFactory: Send + Sync + 'static {
    /// Starts a process for `ctx`, draining its console into `console`.
    fn create(
        &self,
        ctx: &WorkerContext,
        console: Arc<ConsoleLog>,
    ) -> Result<ProcessHandle, WorkerError>;
}
