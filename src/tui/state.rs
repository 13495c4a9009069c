//! Log buffering and transient status messages.

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing_subscriber::fmt::MakeWriter;

/// How long a status message stays on screen.
pub const NOTICE_SECS: i64 = 3;

/// Ring of the newest log lines, shown in the client's log panel.
pub struct LogBuffer {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    fn guard(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a line, evicting the oldest once full.
    pub fn push(&self, line: impl Into<String>) {
        let mut lines = self.guard();
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        if self.capacity > 0 {
            lines.push_back(line.into());
        }
    }

    /// Up to `limit` newest lines, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<String> {
        let lines = self.guard();
        let skip = lines.len().saturating_sub(limit);
        lines.range(skip..).cloned().collect()
    }
}

/// Splits formatted log output into lines; a trailing partial line is
/// emitted when the writer is dropped.
pub struct LogWriter {
    target: Arc<LogBuffer>,
    pending: Vec<u8>,
}

impl LogWriter {
    fn emit(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.target.push(text);
        self.pending.clear();
    }
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut parts = buf.split(|&b| b == b'\n').peekable();
        while let Some(part) = parts.next() {
            self.pending.extend_from_slice(part);
            if parts.peek().is_some() {
                self.emit();
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.emit();
        Ok(())
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        self.emit();
    }
}

/// Plugs a [`LogBuffer`] into `tracing_subscriber::fmt` as its writer.
pub struct LogMakeWriter {
    target: Arc<LogBuffer>,
}

impl LogMakeWriter {
    pub fn new(target: Arc<LogBuffer>) -> Self {
        Self { target }
    }
}

impl<'a> MakeWriter<'a> for LogMakeWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            target: Arc::clone(&self.target),
            pending: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A status line shown for [`NOTICE_SECS`].
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub text: String,
    pub level: NoticeLevel,
    pub shown_at: DateTime<Utc>,
}

/// Latest transient message. A new one replaces the previous.
#[derive(Debug, Default)]
pub struct NoticeBoard {
    current: Option<Notice>,
}

impl NoticeBoard {
    pub fn info(&mut self, text: impl Into<String>, now: DateTime<Utc>) {
        self.show(text.into(), NoticeLevel::Info, now);
    }

    pub fn error(&mut self, text: impl Into<String>, now: DateTime<Utc>) {
        self.show(text.into(), NoticeLevel::Error, now);
    }

    fn show(&mut self, text: String, level: NoticeLevel, now: DateTime<Utc>) {
        self.current = Some(Notice {
            text,
            level,
            shown_at: now,
        });
    }

    /// Message still visible at `now`.
    pub fn visible(&self, now: DateTime<Utc>) -> Option<&Notice> {
        self.current
            .as_ref()
            .filter(|n| now - n.shown_at < Duration::seconds(NOTICE_SECS))
    }
}
