//! # WorkerProcessSupervisor: one external worker process per worker id.
//!
//! Starts a worker through a [`ProcessFactory`], watches its exit on a
//! dedicated monitor task and translates exits into bus events. It never
//! restarts a worker on its own; restart policy lives in a bus subscriber.
//!
//! ## Event flow
//! ```text
//! spawn() ──► factory.create(ctx) ──► ProcessHandle
//!                                        │
//!                        monitor task: handle.exited().await
//!                                        │
//!              ┌─────────────────────────┼───────────────────────────┐
//!        code == -1                 code == n                 exit lost (None)
//!    (orchestrated stop)     publish ProcessError{n}     publish ProcessError{detail}
//!      debug log only
//!
//! notify_restart_required() ──► restarts += 1 ──► publish ProcessRestart{attempt}
//! ```
//!
//! ## Rules
//! - At most **one live process** per supervisor (`spawn` while live → `AlreadyRunning`).
//! - The live slot is cleared **before** `ProcessError` is published, so a
//!   subscriber may call `spawn()` again from its handler.
//! - Each exit is published **at most once** (one monitor per spawned process).
//! - The restart counter belongs to this supervisor only.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use super::console::{ConsoleLog, ConsoleStream};
use super::descriptor::WorkerDescriptor;
use super::process::{INTENTIONAL_EXIT_CODE, ProcessFactory, ProcessHandle};
use crate::config::HostConfig;
use crate::error::WorkerError;
use crate::events::{Event, EventBus, EventKind};

struct Live {
    generation: u64,
    handle: ProcessHandle,
}

#[derive(Default)]
struct Slot {
    live: Option<Live>,
    generation: u64,
}

/// Supervises the processes of a single [`WorkerDescriptor`].
///
/// Instances are independent; the only shared touchpoint is the [`EventBus`].
pub struct WorkerProcessSupervisor {
    descriptor: WorkerDescriptor,
    factory: Arc<dyn ProcessFactory>,
    bus: EventBus,
    port_env_var: String,
    console: Arc<ConsoleLog>,
    slot: Mutex<Slot>,
    restarts: AtomicU32,
}

impl WorkerProcessSupervisor {
    /// Creates a supervisor with the default [`HostConfig`] settings.
    pub fn new(
        descriptor: WorkerDescriptor,
        factory: Arc<dyn ProcessFactory>,
        bus: EventBus,
    ) -> Arc<Self> {
        Self::with_config(descriptor, factory, bus, &HostConfig::default())
    }

    /// Creates a supervisor using the port variable and console size from `cfg`.
    pub fn with_config(
        descriptor: WorkerDescriptor,
        factory: Arc<dyn ProcessFactory>,
        bus: EventBus,
        cfg: &HostConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            descriptor,
            factory,
            bus,
            port_env_var: cfg.port_env_var.clone(),
            console: Arc::new(ConsoleLog::new(cfg.console_lines_clamped())),
            slot: Mutex::new(Slot::default()),
            restarts: AtomicU32::new(0),
        })
    }

    pub fn descriptor(&self) -> &WorkerDescriptor {
        &self.descriptor
    }

    /// Console lines captured from every process of this worker.
    pub fn console(&self) -> Arc<ConsoleLog> {
        self.console.clone()
    }

    /// Restart requests seen so far.
    pub fn restart_count(&self) -> u32 {
        self.restarts.load(Ordering::Relaxed)
    }

    /// True while a spawned process has not reported its exit.
    pub fn is_running(&self) -> bool {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.live
            .as_ref()
            .is_some_and(|live| live.handle.exit_code().is_none())
    }

    /// Starts a process for this worker and begins monitoring it.
    ///
    /// Returns as soon as the OS-level start call returns.
    ///
    /// # Errors
    /// - [`WorkerError::AlreadyRunning`] if a live process exists
    /// - [`WorkerError::Spawn`] if the process could not be started
    pub fn spawn(self: &Arc<Self>) -> Result<ProcessHandle, WorkerError> {
        let (handle, generation) = {
            let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
            if slot
                .live
                .as_ref()
                .is_some_and(|live| live.handle.exit_code().is_none())
            {
                return Err(WorkerError::AlreadyRunning {
                    worker_id: self.descriptor.worker_id.clone(),
                });
            }

            let ctx = self.descriptor.context(&self.port_env_var);
            let handle = self.factory.create(&ctx, self.console.clone())?;
            slot.generation += 1;
            let generation = slot.generation;
            slot.live = Some(Live {
                generation,
                handle: handle.clone(),
            });
            info!(
                worker_id = %self.descriptor.worker_id,
                context_id = %ctx.context_id,
                pid = ?handle.pid(),
                port = self.descriptor.port,
                "worker process started"
            );
            (handle, generation)
        };

        let this = Arc::clone(self);
        let watched = handle.clone();
        tokio::spawn(async move {
            let code = watched.exited().await;
            this.on_exit(generation, code);
        });
        Ok(handle)
    }

    /// Stops the live process; its exit is reported as the intentional sentinel.
    ///
    /// # Errors
    /// [`WorkerError::NotRunning`] if no live process exists.
    pub fn terminate(&self) -> Result<(), WorkerError> {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        match slot.live.as_ref() {
            Some(live) if live.handle.exit_code().is_none() => {
                debug!(worker_id = %self.descriptor.worker_id, "terminating worker process");
                live.handle.terminate();
                Ok(())
            }
            _ => Err(WorkerError::NotRunning {
                worker_id: self.descriptor.worker_id.clone(),
            }),
        }
    }

    /// Reports that this worker needs replacement.
    ///
    /// Publishes `ProcessRestart`; whoever subscribes decides what to do.
    pub fn notify_restart_required(&self) {
        let attempt = self.restarts.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        info!(worker_id = %self.descriptor.worker_id, attempt, "worker restart requested");
        self.bus
            .publish(Event::process_restart(&self.descriptor.worker_id, attempt));
    }

    fn on_exit(&self, generation: u64, code: Option<i32>) {
        {
            let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
            if slot
                .live
                .as_ref()
                .is_some_and(|live| live.generation == generation)
            {
                slot.live = None;
            }
        }

        let worker_id = self.descriptor.worker_id.as_str();
        match code {
            Some(INTENTIONAL_EXIT_CODE) => {
                debug!(worker_id, "worker process stopped intentionally");
            }
            Some(code) => {
                let detail = match self.console.last(ConsoleStream::Stderr) {
                    Some(line) => format!("exited with code {code}: {line}"),
                    None => format!("exited with code {code}"),
                };
                warn!(worker_id, exit_code = code, "{detail}");
                self.bus.publish(Event::process_error(worker_id, code, detail));
            }
            None => {
                warn!(worker_id, "worker process exit status lost");
                self.bus.publish(
                    Event::new(EventKind::ProcessError)
                        .with_worker(worker_id)
                        .with_detail("exit status lost"),
                );
            }
        }
    }
}

impl std::fmt::Debug for WorkerProcessSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerProcessSupervisor")
            .field("worker_id", &self.descriptor.worker_id)
            .field("running", &self.is_running())
            .field("restarts", &self.restart_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::process::{ProcessControl, process_pair};
    use crate::worker::WorkerContext;
    use std::time::Duration;
    use tokio::sync::broadcast;

    /// Hands out handle/control pairs and keeps the controls for the test.
    #[derive(Default)]
    struct Scripted {
        controls: Mutex<Vec<ProcessControl>>,
        contexts: Mutex<Vec<WorkerContext>>,
    }

    impl Scripted {
        fn control(&self, i: usize) -> ProcessControl {
            let mut controls = self.controls.lock().unwrap();
            std::mem::replace(&mut controls[i], process_pair(None).1)
        }
    }

    impl ProcessFactory for Scripted {
        fn create(
            &self,
            ctx: &WorkerContext,
            _console: Arc<ConsoleLog>,
        ) -> Result<ProcessHandle, WorkerError> {
            let (handle, control) = process_pair(Some(42));
            self.controls.lock().unwrap().push(control);
            self.contexts.lock().unwrap().push(ctx.clone());
            Ok(handle)
        }
    }

    fn setup() -> (Arc<Scripted>, Arc<WorkerProcessSupervisor>, broadcast::Receiver<Event>) {
        let bus = EventBus::new(64);
        let rx = bus.tap();
        let factory = Arc::new(Scripted::default());
        let d = WorkerDescriptor::new("node-1", "node", "/srv/app", 7071);
        let sup = WorkerProcessSupervisor::new(d, factory.clone(), bus);
        (factory, sup, rx)
    }

    async fn next_event(rx: &mut broadcast::Receiver<Event>) -> Event {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("event expected")
            .expect("bus open")
    }

    #[tokio::test]
    async fn test_crash_publishes_process_error_once() {
        let (factory, sup, mut rx) = setup();
        let handle = sup.spawn().unwrap();
        assert!(sup.is_running());

        let control = factory.control(0);
        control.report_exit(137);
        control.report_exit(1);
        assert_eq!(handle.exited().await, Some(137));

        let ev = next_event(&mut rx).await;
        assert_eq!(ev.kind, EventKind::ProcessError);
        assert_eq!(ev.worker_id.as_deref(), Some("node-1"));
        assert_eq!(ev.exit_code, Some(137));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
        assert!(!sup.is_running());
    }

    #[tokio::test]
    async fn test_intentional_exit_publishes_nothing() {
        let (factory, sup, mut rx) = setup();
        sup.spawn().unwrap();
        sup.terminate().unwrap();

        let control = factory.control(0);
        assert!(control.is_terminate_requested());
        control.report_exit(INTENTIONAL_EXIT_CODE);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
        assert!(!sup.is_running());
    }

    #[tokio::test]
    async fn test_lost_exit_status_is_reported_without_code() {
        let (factory, sup, mut rx) = setup();
        sup.spawn().unwrap();
        drop(factory.control(0));

        let ev = next_event(&mut rx).await;
        assert_eq!(ev.kind, EventKind::ProcessError);
        assert_eq!(ev.exit_code, None);
        assert_eq!(ev.detail.as_deref(), Some("exit status lost"));
    }

    #[tokio::test]
    async fn test_one_live_process_per_worker() {
        let (factory, sup, _rx) = setup();
        sup.spawn().unwrap();
        let err = sup.spawn().unwrap_err();
        assert_eq!(err.as_label(), "worker_already_running");

        factory.control(0).report_exit(1);
        tokio::time::sleep(Duration::from_millis(20)).await;
        sup.spawn().unwrap();
        assert_eq!(factory.contexts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_spawn_context_carries_port_and_root() {
        let (factory, sup, _rx) = setup();
        sup.spawn().unwrap();

        let contexts = factory.contexts.lock().unwrap();
        let ctx = &contexts[0];
        assert_eq!(
            ctx.environment.get("FUNCTIONS_HTTPWORKER_PORT").map(String::as_str),
            Some("7071")
        );
        assert_eq!(ctx.working_directory, std::path::PathBuf::from("/srv/app"));
    }

    #[tokio::test]
    async fn test_terminate_without_process_fails() {
        let (_factory, sup, _rx) = setup();
        assert_eq!(sup.terminate().unwrap_err().as_label(), "worker_not_running");
    }

    #[tokio::test]
    async fn test_restart_request_is_published_not_acted_on() {
        let (factory, sup, mut rx) = setup();
        sup.notify_restart_required();
        sup.notify_restart_required();

        let first = next_event(&mut rx).await;
        let second = next_event(&mut rx).await;
        assert_eq!(first.kind, EventKind::ProcessRestart);
        assert_eq!(first.attempt, Some(1));
        assert_eq!(second.attempt, Some(2));
        assert_eq!(sup.restart_count(), 2);
        assert!(factory.contexts.lock().unwrap().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_crash_detail_carries_last_stderr_line() {
        let bus = EventBus::new(64);
        let mut rx = bus.tap();
        let d = WorkerDescriptor::new("sh-1", "sh", std::env::temp_dir(), 7071)
            .with_args(["-c", "echo fatal-startup-error >&2; exit 2"]);
        let sup = WorkerProcessSupervisor::new(d, Arc::new(crate::worker::OsProcessFactory), bus);

        for _ in 0..5 {
            sup.spawn().unwrap();
            let ev = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("event expected")
                .expect("bus open");
            assert_eq!(ev.kind, EventKind::ProcessError);
            assert_eq!(ev.exit_code, Some(2));
            assert_eq!(
                ev.detail.as_deref(),
                Some("exited with code 2: fatal-startup-error")
            );
        }
    }
}
