// src/commands/progress.rs
//! Terminal progress for hash verification and installs
//!
//! One bar per package file. The resolver reuses a single tracker for every
//! file and phase, so a finished bar is swapped for a fresh one as soon as
//! the next file starts.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::Mutex;
use sysupdater::ProgressTracker;

const TEMPLATE: &str = "{msg:24} [{bar:40.green/dim}] {bytes}/{total_bytes} {percent:>3}%";

pub struct CliProgress {
    bar: Mutex<ProgressBar>,
}

impl CliProgress {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(new_bar()),
        }
    }

    fn bar(&self) -> ProgressBar {
        match self.bar.lock() {
            Ok(bar) => bar.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Start a new bar if the current one is done
    fn next_file(&self) -> ProgressBar {
        let mut bar = match self.bar.lock() {
            Ok(bar) => bar,
            Err(poisoned) => poisoned.into_inner(),
        };
        if bar.is_finished() {
            *bar = new_bar();
        }
        bar.clone()
    }
}

impl Default for CliProgress {
    fn default() -> Self {
        Self::new()
    }
}

fn new_bar() -> ProgressBar {
    let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr());
    let style = ProgressStyle::default_bar()
        .template(TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
    bar.set_style(style);
    bar
}

impl ProgressTracker for CliProgress {
    fn set_message(&self, message: &str) {
        self.bar().set_message(message.to_string());
    }

    fn increment(&self, amount: u64) {
        self.bar().inc(amount);
    }

    fn set_position(&self, position: u64) {
        let bar = if position == 0 { self.next_file() } else { self.bar() };
        bar.set_position(position);
    }

    fn set_length(&self, length: u64) {
        self.next_file().set_length(length);
    }

    fn position(&self) -> u64 {
        self.bar().position()
    }

    fn length(&self) -> u64 {
        self.bar().length().unwrap_or(0)
    }

    fn finish_with_message(&self, message: &str) {
        self.bar().finish_with_message(message.to_string());
    }

    fn finish_with_error(&self, message: &str) {
        self.bar().abandon_with_message(message.to_string());
    }

    fn is_finished(&self) -> bool {
        self.bar().is_finished()
    }
}
