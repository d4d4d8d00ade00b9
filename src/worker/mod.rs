//! Worker process supervision.
//!
//! - [`WorkerDescriptor`]: what to run (id, executable, args, cwd, port, env)
//! - [`ProcessFactory`] / [`ProcessHandle`]: the process-handle abstraction
//! - [`OsProcessFactory`]: the `tokio::process` binding
//! - [`ConsoleLog`]: bounded capture of stdout/stderr
//! - [`WorkerProcessSupervisor`]: spawn, exit monitoring, restart signaling

mod console;
mod descriptor;
mod os;
mod process;
mod supervisor;

pub use console::{ConsoleLine, ConsoleLog, ConsoleStream};
pub use descriptor::{WorkerContext, WorkerDescriptor};
pub use os::OsProcessFactory;
pub use process::{
    INTENTIONAL_EXIT_CODE, ProcessControl, ProcessFactory, ProcessHandle, process_pair,
};
pub use supervisor::WorkerProcessSupervisor;
