//! # Worker console capture.
//!
//! stdout/stderr of a worker are drained line by line on background tasks into
//! a bounded [`ConsoleLog`]. Reading never waits on the log, so the child's
//! pipes never fill up; when the log is full the oldest line is dropped.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, warn};

/// Which pipe a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleStream {
    Stdout,
    Stderr,
}

impl ConsoleStream {
    pub fn as_label(&self) -> &'static str {
        match self {
            ConsoleStream::Stdout => "stdout",
            ConsoleStream::Stderr => "stderr",
        }
    }
}

/// One captured console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleLine {
    pub stream: ConsoleStream,
    pub text: String,
}

/// Bounded, drop-oldest ring of console lines for one worker.
#[derive(Debug)]
pub struct ConsoleLog {
    capacity: usize,
    lines: Mutex<VecDeque<ConsoleLine>>,
    dropped: AtomicU64,
}

impl ConsoleLog {
    /// Creates a log holding at most `capacity` lines (clamped to 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            lines: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            dropped: AtomicU64::new(0),
        }
    }

    /// Appends a line, evicting the oldest one when full.
    pub fn push(&self, stream: ConsoleStream, text: impl Into<String>) {
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        if lines.len() == self.capacity {
            lines.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        lines.push_back(ConsoleLine {
            stream,
            text: text.into(),
        });
    }

    /// Copy of the retained lines, oldest first.
    pub fn snapshot(&self) -> Vec<ConsoleLine> {
        let lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        lines.iter().cloned().collect()
    }

    /// Most recent line written to `stream`.
    pub fn last(&self, stream: ConsoleStream) -> Option<String> {
        let lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        lines
            .iter()
            .rev()
            .find(|l| l.stream == stream)
            .map(|l| l.text.clone())
    }

    /// Number of lines evicted so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Longest line kept in the log; the rest of a longer line is discarded.
pub const MAX_LINE_BYTES: usize = 16 * 1024;

/// Reads `reader` to EOF, one line at a time, into `log`.
///
/// Lines are decoded lossily and cut at [`MAX_LINE_BYTES`]. Neither stops the
/// drain: the pipe stays open until the child closes it.
pub(crate) async fn drain<R>(reader: R, log: Arc<ConsoleLog>, stream: ConsoleStream, worker_id: String)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::with_capacity(256);
    loop {
        buf.clear();
        let truncated = match read_line_capped(&mut reader, &mut buf, MAX_LINE_BYTES).await {
            Ok(None) => break,
            Ok(Some(truncated)) => truncated,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                // the pipe itself failed; nothing more can be read from it
                warn!(worker_id = %worker_id, stream = stream.as_label(), error = %e, "console read failed");
                break;
            }
        };
        if truncated {
            warn!(
                worker_id = %worker_id,
                stream = stream.as_label(),
                limit = MAX_LINE_BYTES,
                "console line truncated"
            );
        }

        let line = String::from_utf8_lossy(trim_line_end(&buf)).into_owned();
        debug!(worker_id = %worker_id, stream = stream.as_label(), "{line}");
        log.push(stream, line);
    }
}

/// Reads up to and including the next `\n`, keeping at most `cap` bytes in `buf`.
///
/// Returns `None` at EOF, otherwise whether bytes past `cap` were discarded.
async fn read_line_capped<R>(reader: &mut R, buf: &mut Vec<u8>, cap: usize) -> io::Result<Option<bool>>
where
    R: AsyncBufRead + Unpin,
{
    let mut seen = false;
    let mut truncated = false;
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(seen.then_some(truncated));
        }
        seen = true;

        let (used, done) = match available.iter().position(|b| *b == b'\n') {
            Some(i) => (i + 1, true),
            None => (available.len(), false),
        };
        let keep = used.min(cap.saturating_sub(buf.len()));
        buf.extend_from_slice(&available[..keep]);
        truncated |= keep < used && available[keep..used] != [b'\n'];
        reader.consume(used);

        if done {
            return Ok(Some(truncated));
        }
    }
}

fn trim_line_end(mut line: &[u8]) -> &[u8] {
    if let [rest @ .., b'\n'] = line {
        line = rest;
    }
    if let [rest @ .., b'\r'] = line {
        line = rest;
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drops_oldest_when_full() {
        let log = ConsoleLog::new(2);
        log.push(ConsoleStream::Stdout, "a");
        log.push(ConsoleStream::Stderr, "b");
        log.push(ConsoleStream::Stdout, "c");

        let texts: Vec<_> = log.snapshot().into_iter().map(|l| l.text).collect();
        assert_eq!(texts, vec!["b", "c"]);
        assert_eq!(log.dropped(), 1);
        assert_eq!(log.last(ConsoleStream::Stderr).as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_drain_reads_until_eof() {
        let log = Arc::new(ConsoleLog::new(10));
        let input: &[u8] = b"first\nsecond\nthird";
        drain(input, log.clone(), ConsoleStream::Stdout, "w1".into()).await;

        let texts: Vec<_> = log.snapshot().into_iter().map(|l| l.text).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_drain_survives_invalid_utf8() {
        let log = Arc::new(ConsoleLog::new(10));
        let input: &[u8] = b"bad \xff\xfe\r\nstill here\n";
        drain(input, log.clone(), ConsoleStream::Stderr, "w1".into()).await;

        let texts: Vec<_> = log.snapshot().into_iter().map(|l| l.text).collect();
        assert_eq!(texts, vec!["bad \u{FFFD}\u{FFFD}", "still here"]);
    }

    #[tokio::test]
    async fn test_drain_caps_long_lines_and_keeps_reading() {
        let log = Arc::new(ConsoleLog::new(10));
        let mut input = vec![b'x'; MAX_LINE_BYTES * 3];
        input.extend_from_slice(b"\nnext\n");
        drain(input.as_slice(), log.clone(), ConsoleStream::Stdout, "w1".into()).await;

        let lines = log.snapshot();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text.len(), MAX_LINE_BYTES);
        assert_eq!(lines[1].text, "next");
    }
}
