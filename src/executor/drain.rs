//! Line draining of an action's output streams into one bounded queue.

use super::Stream;
use crate::action::OutputReader;
use crate::OverflowPolicy;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::io;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OutputLine {
    pub(crate) stream: Stream,
    pub(crate) line: String,
}

/// Two reader tasks feeding one queue.
pub(crate) struct Drain {
    rx: mpsc::Receiver<OutputLine>,
    readers: Vec<JoinHandle<()>>,
    dropped: Arc<AtomicUsize>,
}

impl Drain {
    /// Start one reader per stream. Lines longer than `max_line_bytes` are
    /// split.
    pub(crate) fn spawn(
        stdout: OutputReader,
        stderr: OutputReader,
        capacity: usize,
        max_line_bytes: usize,
        policy: OverflowPolicy,
    ) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let dropped = Arc::new(AtomicUsize::new(0));
        let max = max_line_bytes.max(1);
        let readers = vec![
            spawn_reader(
                LineReader::new(stdout, max),
                Stream::Stdout,
                tx.clone(),
                policy,
                dropped.clone(),
            ),
            spawn_reader(
                LineReader::new(stderr, max),
                Stream::Stderr,
                tx,
                policy,
                dropped.clone(),
            ),
        ];
        Self {
            rx,
            readers,
            dropped,
        }
    }

    /// Next line from either stream. `None` once both streams hit EOF.
    pub(crate) async fn recv(&mut self) -> Option<OutputLine> {
        self.rx.recv().await
    }

    /// A line already waiting in the queue, without waiting for more.
    pub(crate) fn try_recv(&mut self) -> Option<OutputLine> {
        self.rx.try_recv().ok()
    }

    /// Stop both readers and release the pipes they hold. Returns the number
    /// of dropped lines.
    pub(crate) async fn close(mut self) -> usize {
        self.rx.close();
        for reader in &self.readers {
            reader.abort();
        }
        for reader in self.readers.drain(..) {
            let _ = reader.await;
        }
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Splits a stream at `\n`, `\r` or `\r\n`, and after `max` bytes.
pub(crate) struct LineReader {
    inner: BufReader<OutputReader>,
    max: usize,
    after_cr: bool,
}

impl LineReader {
    pub(crate) fn new(reader: OutputReader, max: usize) -> Self {
        Self {
            inner: BufReader::new(reader),
            max,
            after_cr: false,
        }
    }

    /// Fill `buf` with the next line, without its terminator. Returns
    /// `false` at end of stream.
    pub(crate) async fn next_line(&mut self, buf: &mut Vec<u8>) -> io::Result<bool> {
        buf.clear();
        loop {
            let available = self.inner.fill_buf().await?;
            if available.is_empty() {
                return Ok(!buf.is_empty());
            }
            // The `\n` of a `\r\n` pair.
            if self.after_cr {
                self.after_cr = false;
                if available[0] == b'\n' {
                    self.inner.consume(1);
                    continue;
                }
            }

            let room = self.max - buf.len();
            let window = &available[..available.len().min(room)];
            match window.iter().position(|b| *b == b'\n' || *b == b'\r') {
                Some(end) => {
                    self.after_cr = window[end] == b'\r';
                    buf.extend_from_slice(&window[..end]);
                    self.inner.consume(end + 1);
                    return Ok(true);
                }
                None => {
                    let taken = window.len();
                    buf.extend_from_slice(window);
                    self.inner.consume(taken);
                    if buf.len() >= self.max {
                        return Ok(true);
                    }
                }
            }
        }
    }
}

fn spawn_reader(
    mut reader: LineReader,
    stream: Stream,
    tx: mpsc::Sender<OutputLine>,
    policy: OverflowPolicy,
    dropped: Arc<AtomicUsize>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = Vec::new();
        loop {
            match reader.next_line(&mut buf).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    debug!(%stream, error = %e, "output stream read failed");
                    break;
                }
            }

            let line = String::from_utf8_lossy(&buf).into_owned();
            let item = OutputLine { stream, line };

            match policy {
                OverflowPolicy::Backpressure => {
                    if tx.send(item).await.is_err() {
                        break;
                    }
                }
                OverflowPolicy::DropNewest => match tx.try_send(item) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(TrySendError::Closed(_)) => break,
                },
            }
        }
    })
}

/// The trailing lines of a step's output.
#[derive(Debug)]
pub(crate) struct OutputLog {
    lines: VecDeque<String>,
    max: usize,
}

impl OutputLog {
    pub(crate) fn new(max: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            max,
        }
    }

    pub(crate) fn push(&mut self, line: String) {
        if self.max == 0 {
            return;
        }
        if self.lines.len() == self.max {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub(crate) fn into_string(self) -> String {
        Vec::from(self.lines).join("\n")
    }
}
