// src/progress.rs

//! Shared progress tracking trait and implementations
//!
//! Long-running steps (hash verification, file copies, plan execution) report
//! progress through [`ProgressTracker`]. Updates are delivered synchronously
//! on the calling thread after each block, so implementations must return
//! quickly and must not call back into the resolver.
//!
//! Implementations in this crate:
//! - `SilentProgress`: no-op for tests and scripted runs
//! - `LogProgress`: logs to tracing at roughly 10% intervals (`--quiet`)
//! - `CallbackProgress`: forwards [`ProgressEvent`]s to a closure
//!
//! The binary adds an indicatif-backed tracker for the terminal.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::info;

/// Core trait for progress tracking
pub trait ProgressTracker: Send + Sync {
    /// Set the current status message
    fn set_message(&self, message: &str);

    /// Increment progress by the given amount
    fn increment(&self, amount: u64);

    /// Set progress to a specific position
    fn set_position(&self, position: u64);

    /// Set the total (length) of the progress
    fn set_length(&self, length: u64);

    fn position(&self) -> u64;

    fn length(&self) -> u64;

    /// Finish progress successfully with a message
    fn finish_with_message(&self, message: &str);

    /// Finish progress with an error/abandonment message
    fn finish_with_error(&self, message: &str);

    fn is_finished(&self) -> bool;

    /// Whole-number percentage of position over length
    fn percent(&self) -> u32 {
        percent_of(self.position(), self.length())
    }
}

/// `done * 100 / total`, saturating at 100; an empty total counts as complete
pub fn percent_of(done: u64, total: u64) -> u32 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) as u128 * 100) / total as u128) as u32
}

/// Silent progress tracker (no-op)
#[derive(Debug, Default)]
pub struct SilentProgress {
    position: AtomicU64,
    length: AtomicU64,
    finished: AtomicBool,
}

impl SilentProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_length(length: u64) -> Self {
        Self {
            length: AtomicU64::new(length),
            ..Default::default()
        }
    }
}

impl ProgressTracker for SilentProgress {
    fn set_message(&self, _message: &str) {}

    fn increment(&self, amount: u64) {
        self.position.fetch_add(amount, Ordering::Relaxed);
    }

    fn set_position(&self, position: u64) {
        self.position.store(position, Ordering::Relaxed);
    }

    fn set_length(&self, length: u64) {
        self.length.store(length, Ordering::Relaxed);
    }

    fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    fn length(&self) -> u64 {
        self.length.load(Ordering::Relaxed)
    }

    fn finish_with_message(&self, _message: &str) {
        self.finished.store(true, Ordering::Relaxed);
    }

    fn finish_with_error(&self, _message: &str) {
        self.finished.store(true, Ordering::Relaxed);
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }
}

/// Logging progress tracker
///
/// Logs progress updates to tracing at info level, about ten times over the
/// full length.
#[derive(Debug)]
pub struct LogProgress {
    name: String,
    position: AtomicU64,
    length: AtomicU64,
    finished: AtomicBool,
}

impl LogProgress {
    pub fn new(name: impl Into<String>, length: u64) -> Self {
        Self {
            name: name.into(),
            position: AtomicU64::new(0),
            length: AtomicU64::new(length),
            finished: AtomicBool::new(false),
        }
    }

    fn log_interval(&self) -> u64 {
        std::cmp::max(1, self.length.load(Ordering::Relaxed) / 10)
    }
}

impl ProgressTracker for LogProgress {
    fn set_message(&self, message: &str) {
        info!("{}: {}", self.name, message);
    }

    fn increment(&self, amount: u64) {
        let old_pos = self.position.fetch_add(amount, Ordering::Relaxed);
        let new_pos = old_pos + amount;
        let length = self.length.load(Ordering::Relaxed);
        let interval = self.log_interval();

        if length > 0 && new_pos / interval > old_pos / interval {
            info!(
                "{}: {}% ({}/{})",
                self.name,
                percent_of(new_pos, length),
                new_pos,
                length
            );
        }
    }

    fn set_position(&self, position: u64) {
        self.position.store(position, Ordering::Relaxed);
    }

    fn set_length(&self, length: u64) {
        self.length.store(length, Ordering::Relaxed);
    }

    fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    fn length(&self) -> u64 {
        self.length.load(Ordering::Relaxed)
    }

    fn finish_with_message(&self, message: &str) {
        self.finished.store(true, Ordering::Relaxed);
        info!("{}: {}", self.name, message);
    }

    fn finish_with_error(&self, message: &str) {
        self.finished.store(true, Ordering::Relaxed);
        info!("{}: ERROR - {}", self.name, message);
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }
}

/// Events emitted by [`CallbackProgress`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Message(String),
    Position { current: u64, total: u64 },
    Finished(String),
    Error(String),
}

/// Callback-based progress tracker
pub struct CallbackProgress<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    callback: F,
    position: AtomicU64,
    length: AtomicU64,
    finished: AtomicBool,
}

impl<F> CallbackProgress<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    pub fn new(length: u64, callback: F) -> Self {
        Self {
            callback,
            position: AtomicU64::new(0),
            length: AtomicU64::new(length),
            finished: AtomicBool::new(false),
        }
    }
}

impl<F> ProgressTracker for CallbackProgress<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn set_message(&self, message: &str) {
        (self.callback)(ProgressEvent::Message(message.to_string()));
    }

    fn increment(&self, amount: u64) {
        let new_pos = self.position.fetch_add(amount, Ordering::Relaxed) + amount;
        let length = self.length.load(Ordering::Relaxed);
        (self.callback)(ProgressEvent::Position {
            current: new_pos,
            total: length,
        });
    }

    fn set_position(&self, position: u64) {
        self.position.store(position, Ordering::Relaxed);
        let length = self.length.load(Ordering::Relaxed);
        (self.callback)(ProgressEvent::Position {
            current: position,
            total: length,
        });
    }

    fn set_length(&self, length: u64) {
        self.length.store(length, Ordering::Relaxed);
    }

    fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    fn length(&self) -> u64 {
        self.length.load(Ordering::Relaxed)
    }

    fn finish_with_message(&self, message: &str) {
        self.finished.store(true, Ordering::Relaxed);
        (self.callback)(ProgressEvent::Finished(message.to_string()));
    }

    fn finish_with_error(&self, message: &str) {
        self.finished.store(true, Ordering::Relaxed);
        (self.callback)(ProgressEvent::Error(message.to_string()));
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }
}
