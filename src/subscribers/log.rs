//! # LogWriter: lifecycle event logger
//!
//! A passive diagnostics subscriber that turns incoming [`Event`]s into
//! structured `tracing` records.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! WARN  worker process exited seq=4 worker_id="node-1" exit_code=137 detail="killed"
//! INFO  worker restart requested seq=5 worker_id="node-1" attempt=2
//! INFO  host specialized seq=6
//! WARN  subscriber dropped event subscriber="audit" detail="subscriber=audit reason=full"
//! ```

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event logging subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let worker_id = e.worker_id.as_deref().unwrap_or("unknown");
        let detail = e.detail.as_deref().unwrap_or("");
        match e.kind {
            EventKind::ProcessError => {
                warn!(
                    seq = e.seq,
                    worker_id,
                    exit_code = e.exit_code,
                    detail,
                    "worker process exited"
                );
            }
            EventKind::ProcessRestart => {
                info!(seq = e.seq, worker_id, attempt = e.attempt, "worker restart requested");
            }
            EventKind::Specialized => {
                info!(seq = e.seq, "host specialized");
            }
            EventKind::SubscriberOverflow => {
                warn!(subscriber = e.subscriber, detail, "subscriber dropped event");
            }
            EventKind::SubscriberPanicked => {
                error!(subscriber = e.subscriber, detail, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Logs `event` through a fresh fmt subscriber and returns its output.
    async fn logged(event: Event) -> String {
        let out = Captured::default();
        let writer = out.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .without_time()
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        LogWriter::new().on_event(&event).await;

        let bytes = out.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[tokio::test]
    async fn test_process_error_is_a_warning_with_exit_code() {
        let out = logged(Event::process_error("w1", 137, "killed")).await;
        assert!(out.contains("WARN"), "{out}");
        assert!(out.contains("worker process exited"), "{out}");
        assert!(out.contains("worker_id=\"w1\""), "{out}");
        assert!(out.contains("exit_code=137"), "{out}");
        assert!(out.contains("killed"), "{out}");
    }

    #[tokio::test]
    async fn test_restart_is_info_with_attempt() {
        let out = logged(Event::process_restart("w1", 2)).await;
        assert!(out.contains("INFO"), "{out}");
        assert!(out.contains("worker restart requested"), "{out}");
        assert!(out.contains("attempt=2"), "{out}");
    }

    #[tokio::test]
    async fn test_subscriber_diagnostics_use_their_levels() {
        let overflow = logged(Event::subscriber_overflow("audit", "full")).await;
        assert!(overflow.contains("WARN"), "{overflow}");
        assert!(overflow.contains("subscriber dropped event"), "{overflow}");

        let panicked = logged(Event::subscriber_panicked("audit", "boom".into())).await;
        assert!(panicked.contains("ERROR"), "{panicked}");
        assert!(panicked.contains("boom"), "{panicked}");
    }

    #[tokio::test]
    async fn test_specialized_is_info() {
        let out = logged(Event::specialized()).await;
        assert!(out.contains("INFO"), "{out}");
        assert!(out.contains("host specialized"), "{out}");
        assert_eq!(LogWriter::new().name(), "LogWriter");
    }
}
