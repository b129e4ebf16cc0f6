//! Log sinks for analyzed functions
//!
//! Every analyzed function writes one line per invocation to its sink. Lines
//! look like `<timestamp> - <message>`, with the timestamp in local time as
//! `YYYY-MM-DD HH:MM:SS,mmm`.

use chrono::Local;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Destination for per-call log lines
pub trait LogSink: Send + Sync + fmt::Debug {
    /// Write one informational line
    fn info(&self, message: &str);
}

/// Prefix a message with the current local timestamp
pub fn format_line(message: &str) -> String {
    format!(
        "{} - {}",
        Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
        message
    )
}

/// Writes lines to stderr
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn info(&self, message: &str) {
        eprintln!("{}", format_line(message));
    }
}

/// Appends lines to a file, flushing after every line
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileSink {
    /// Open (or create) `path` for appending
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Path this sink appends to
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FileSink {
    fn info(&self, message: &str) {
        let line = format_line(message);
        let mut file = self.file.lock();
        if let Err(err) = writeln!(file, "{}", line).and_then(|()| file.flush()) {
            // Losing a log line must not turn into a failure of the analyzed call
            tracing::warn!(path = %self.path.display(), error = %err, "failed to write log line");
        }
    }
}

/// Keeps lines in memory; useful for embedding and tests
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every line written so far
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl LogSink for MemorySink {
    fn info(&self, message: &str) {
        self.lines.lock().push(format_line(message));
    }
}

/// Where an analyzed function's log lines go
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    /// stderr
    #[default]
    Console,
    /// Append to a file
    File(PathBuf),
}

impl LogTarget {
    /// Create the sink this target describes
    pub fn open(&self) -> io::Result<Arc<dyn LogSink>> {
        Ok(match self {
            LogTarget::Console => Arc::new(ConsoleSink),
            LogTarget::File(path) => Arc::new(FileSink::open(path)?),
        })
    }
}
