// src/logging.rs

//! Operator-facing status output
//!
//! Status lines are what the operator reads: progress of each phase, the
//! per-title verification report, and the final diagnostic. They are sent to
//! an explicitly constructed [`StatusSink`] that the caller hands to the
//! resolver and the session. Diagnostics for developers go through `tracing`
//! as usual.

use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Width of the session separator in the log file
const SEPARATOR_WIDTH: usize = 64;

/// Destination for operator status lines
pub trait StatusSink {
    /// Emit one status line
    fn line(&self, message: &str);

    /// Emit a diagnostic line
    fn error(&self, message: &str) {
        self.line(message);
    }
}

/// Console output mirrored to an append-only log file
pub struct StatusLog {
    file: Mutex<Option<File>>,
    path: Option<PathBuf>,
}

impl StatusLog {
    /// Open (or create) the log file in append mode and start a session
    ///
    /// If the file cannot be opened the sink still writes to the console.
    pub fn open(path: &Path) -> Self {
        let file = OpenOptions::new().create(true).append(true).open(path);
        match file {
            Ok(mut file) => {
                let header = session_header();
                if let Err(e) = writeln!(file, "{}", header).and_then(|_| file.flush()) {
                    warn!("Failed to write log header to {}: {}", path.display(), e);
                }
                debug!("Status log opened at {}", path.display());
                Self {
                    file: Mutex::new(Some(file)),
                    path: Some(path.to_path_buf()),
                }
            }
            Err(e) => {
                warn!(
                    "Failed to open log file {}: {}; logging to console only",
                    path.display(),
                    e
                );
                Self::console_only()
            }
        }
    }

    pub fn console_only() -> Self {
        Self {
            file: Mutex::new(None),
            path: None,
        }
    }

    /// Log file in use, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn append(&self, message: &str) {
        let Ok(mut guard) = self.file.lock() else {
            return;
        };
        if let Some(file) = guard.as_mut()
            && let Err(e) = writeln!(file, "{}", message).and_then(|_| file.flush())
        {
            warn!("Failed to append to status log: {}; disabling file output", e);
            *guard = None;
        }
    }
}

impl StatusSink for StatusLog {
    fn line(&self, message: &str) {
        println!("{}", message);
        self.append(message);
    }

    fn error(&self, message: &str) {
        eprintln!("{}", message);
        self.append(message);
    }
}

fn session_header() -> String {
    let stamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let dashes = SEPARATOR_WIDTH.saturating_sub(stamp.len() + 2) / 2;
    format!("{} {} {}", "-".repeat(dashes), stamp, "-".repeat(dashes))
}

/// In-memory sink for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryLog {
    lines: Mutex<Vec<String>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// True if any line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

impl StatusSink for MemoryLog {
    fn line(&self, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(message.to_string());
        }
    }
}
