//! Queue-backed log writer
//!
//! The tick thread must never block on disk. Formatted log lines go into an
//! unbounded channel and a single consumer thread appends them to the log
//! file, flushing after each line. A bounded tail of recent lines is kept in
//! memory for the `log` command.

use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use eyre::{Context, Result};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing_subscriber::fmt::MakeWriter;

/// Consumer sleep when the queue is empty
const IDLE_SLEEP: Duration = Duration::from_millis(10);

/// Poll step while waiting for the consumer to finish
const JOIN_POLL: Duration = Duration::from_millis(5);

/// Recent log lines, oldest first
#[derive(Debug, Clone)]
pub struct LogTail {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl LogTail {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn push(&self, line: &str) {
        if self.capacity == 0 {
            return;
        }
        let mut lines = self.lock();
        while lines.len() >= self.capacity {
            lines.pop_front();
        }
        lines.push_back(line.to_string());
    }

    /// Up to `n` most recent lines, oldest first
    pub fn recent(&self, n: usize) -> Vec<String> {
        let lines = self.lock();
        let skip = lines.len().saturating_sub(n);
        lines.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<String>> {
        // a panicking producer leaves plain strings behind; keep using them
        self.lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Owner of the consumer thread
pub struct LogQueue {
    sender: UnboundedSender<String>,
    tail: LogTail,
    shutdown: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl LogQueue {
    /// Start a queue appending to `path`, creating parent directories
    pub fn start(path: &Path, tail_lines: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create log directory")?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .context(format!("Failed to open log file {}", path.display()))?;
        Ok(Self::with_writer(file, tail_lines))
    }

    /// Start a queue draining into any writer
    pub fn with_writer<W: Write + Send + 'static>(writer: W, tail_lines: usize) -> Self {
        let (sender, receiver) = unbounded_channel();
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let worker = thread::Builder::new()
            .name("qf-log-writer".to_string())
            .spawn(move || drain(receiver, writer, flag))
            .ok();

        Self {
            sender,
            tail: LogTail::new(tail_lines),
            shutdown,
            worker,
        }
    }

    /// `MakeWriter` for a tracing fmt subscriber
    pub fn make_writer(&self) -> QueueMakeWriter {
        QueueMakeWriter {
            sender: self.sender.clone(),
            tail: self.tail.clone(),
        }
    }

    pub fn tail(&self) -> LogTail {
        self.tail.clone()
    }

    /// Stop the consumer, waiting at most `timeout` for it to drain
    ///
    /// Returns false when the deadline passed first; unwritten lines are lost.
    pub fn shutdown(mut self, timeout: Duration) -> bool {
        self.shutdown.store(true, Ordering::Release);
        let Some(worker) = self.worker.take() else {
            return false;
        };

        let deadline = Instant::now() + timeout;
        while !worker.is_finished() {
            if Instant::now() >= deadline {
                eprintln!("Warning: log writer did not drain within {:?}", timeout);
                return false;
            }
            thread::sleep(JOIN_POLL);
        }
        worker.join().is_ok()
    }
}

fn drain<W: Write>(mut receiver: UnboundedReceiver<String>, mut writer: W, shutdown: Arc<AtomicBool>) {
    loop {
        match receiver.try_recv() {
            Ok(line) => {
                // nowhere left to report a failing log file
                let _ = writer.write_all(line.as_bytes()).and_then(|_| writer.flush());
            }
            Err(TryRecvError::Empty) => {
                if shutdown.load(Ordering::Acquire) {
                    break;
                }
                thread::sleep(IDLE_SLEEP);
            }
            Err(TryRecvError::Disconnected) => break,
        }
    }
}

/// Hands out one [`QueueWriter`] per log event
#[derive(Clone)]
pub struct QueueMakeWriter {
    sender: UnboundedSender<String>,
    tail: LogTail,
}

impl<'a> MakeWriter<'a> for QueueMakeWriter {
    type Writer = QueueWriter;

    fn make_writer(&'a self) -> Self::Writer {
        QueueWriter {
            sender: self.sender.clone(),
            tail: self.tail.clone(),
            buf: Vec::new(),
        }
    }
}

/// Buffers one event and enqueues it when dropped
pub struct QueueWriter {
    sender: UnboundedSender<String>,
    tail: LogTail,
    buf: Vec<u8>,
}

impl Write for QueueWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for QueueWriter {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let text = String::from_utf8_lossy(&self.buf).into_owned();
        for line in text.lines().filter(|l| !l.is_empty()) {
            self.tail.push(line);
        }
        // consumer gone means shutdown already happened
        let _ = self.sender.send(text);
    }
}
