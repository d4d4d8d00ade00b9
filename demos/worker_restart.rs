//! # Example: worker_restart
//!
//! Restart policy as a bus subscriber.
//!
//! The supervisor never restarts a worker on its own. It publishes
//! `ProcessError` when the worker dies; the policy below decides to respawn
//! it, records the attempt with `notify_restart_required()` and gives up
//! after [`MAX_ATTEMPTS`].
//!
//! ## Flow
//! ```text
//! spawn() ──► sh worker ──► prints, exits 1
//!     └─► monitor ──► bus.publish(ProcessError{exit_code: 1, detail: last stderr line})
//!             └─► RestartPolicy.on_event()
//!                   ├─ attempts < MAX_ATTEMPTS → notify_restart_required() + spawn()
//!                   └─ otherwise               → done.notify_one()
//! ```
//!
//! ## Run
//! Needs a POSIX `sh`.
//! ```bash
//! cargo run --example worker_restart
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hostvisor::{
    Event, EventBus, EventKind, HostConfig, LogWriter, OsProcessFactory, Subscribe,
    WorkerDescriptor, WorkerProcessSupervisor,
};
use tokio::sync::Notify;

const MAX_ATTEMPTS: u32 = 3;

struct RestartPolicy {
    supervisor: Arc<WorkerProcessSupervisor>,
    done: Arc<Notify>,
}

#[async_trait]
impl Subscribe for RestartPolicy {
    async fn on_event(&self, ev: &Event) {
        if ev.kind != EventKind::ProcessError {
            return;
        }
        println!(
            "worker {} died: {}",
            ev.worker_id.as_deref().unwrap_or("?"),
            ev.detail.as_deref().unwrap_or("")
        );

        if self.supervisor.restart_count() >= MAX_ATTEMPTS {
            println!("giving up after {MAX_ATTEMPTS} restarts");
            self.done.notify_one();
            return;
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        self.supervisor.notify_restart_required();
        if let Err(e) = self.supervisor.spawn() {
            eprintln!("respawn failed: {e}");
            self.done.notify_one();
        }
    }

    fn name(&self) -> &'static str {
        "restart-policy"
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    hostvisor::init_tracing();

    let cfg = HostConfig::default();
    let bus = EventBus::new(cfg.bus_capacity_clamped());
    let _log = bus.subscribe_all(Arc::new(LogWriter::new()));

    let descriptor = WorkerDescriptor::new("flaky-worker", "sh", std::env::temp_dir(), 8081).with_args([
        "-c",
        "echo listening on $FUNCTIONS_HTTPWORKER_PORT; sleep 0.2; echo unhandled exception >&2; exit 1",
    ]);
    let supervisor =
        WorkerProcessSupervisor::with_config(descriptor, Arc::new(OsProcessFactory), bus.clone(), &cfg);

    let done = Arc::new(Notify::new());
    let _policy = bus.subscribe(
        Arc::new(RestartPolicy {
            supervisor: supervisor.clone(),
            done: done.clone(),
        }),
        |ev| ev.kind == EventKind::ProcessError,
    );

    supervisor.spawn()?;
    done.notified().await;

    for line in supervisor.console().snapshot() {
        println!("[{}] {}", line.stream.as_label(), line.text);
    }
    println!("restarts: {}", supervisor.restart_count());

    bus.shutdown().await;
    Ok(())
}
