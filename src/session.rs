// src/session.rs

//! Operator session
//!
//! A session prints the menu, waits for one mode command and runs it. Every
//! mode starts with the privileged-access check. Success always ends in a
//! delayed restart of the host. Failure prints the diagnostic and then waits
//! for the exit command; once a mode has run nothing but exit is accepted.

use crate::error::{Error, ErrorKind, Result};
use crate::logging::StatusSink;
use crate::platform::{AccessGrant, Platform};
use crate::prompt::{Command, Operator};
use crate::resolver::{ExecutionReport, UpdateMode, UpdateResolver};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_REBOOT_DELAY: Duration = Duration::from_secs(10);

const MENU: &[&str] = &[
    "sysUpdater",
    "(A) update (Y) downgrade (X) test access (B) exit",
    "The installation cannot be aborted once started!",
];

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Operator exited without running a mode
    Exited,
    /// The mode succeeded and the host was restarted
    Restarted(Command),
    /// The mode failed; the operator has acknowledged with exit
    Failed(ErrorKind),
}

impl SessionOutcome {
    pub fn is_success(self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

pub struct Session<'a, P: Platform> {
    platform: &'a mut P,
    resolver: &'a UpdateResolver<'a>,
    status: &'a dyn StatusSink,
    reboot_delay: Duration,
}

impl<'a, P: Platform> Session<'a, P> {
    pub fn new(
        platform: &'a mut P,
        resolver: &'a UpdateResolver<'a>,
        status: &'a dyn StatusSink,
    ) -> Self {
        Self {
            platform,
            resolver,
            status,
            reboot_delay: DEFAULT_REBOOT_DELAY,
        }
    }

    pub fn with_reboot_delay(mut self, delay: Duration) -> Self {
        self.reboot_delay = delay;
        self
    }

    pub fn print_menu(&self) {
        for line in MENU {
            self.status.line(line);
        }
    }

    /// Interactive session: menu, one command, then restart or wait for exit
    pub fn run(&mut self, operator: &mut dyn Operator) -> Result<SessionOutcome> {
        self.print_menu();
        let command = operator.next_command()?;
        debug!("Operator chose {}", command);
        self.dispatch(command, operator)
    }

    /// Run a single command with the full success/failure handling
    pub fn dispatch(
        &mut self,
        command: Command,
        operator: &mut dyn Operator,
    ) -> Result<SessionOutcome> {
        let result = match command {
            Command::Exit => return Ok(SessionOutcome::Exited),
            Command::Update => self.update(operator, UpdateMode::Upgrade).map(|_| ()),
            Command::Downgrade => self.update(operator, UpdateMode::Downgrade).map(|_| ()),
            Command::SelfTest => self.self_test().map(|_| ()),
        };

        match result {
            Ok(()) => Ok(SessionOutcome::Restarted(command)),
            Err(err) => {
                self.report_error(&err);
                self.status.line("Press (B) to exit.");
                operator.wait_for_exit()?;
                Ok(SessionOutcome::Failed(err.kind()))
            }
        }
    }

    /// Access check, resolve, execute, restart
    pub fn update(
        &mut self,
        operator: &mut dyn Operator,
        mode: UpdateMode,
    ) -> Result<ExecutionReport> {
        self.acquire_access()?;
        self.status.line(match mode {
            UpdateMode::Upgrade => "Beginning update...",
            UpdateMode::Downgrade => "Beginning downgrade...",
        });

        let report = self.resolver.run(&mut *self.platform, operator, mode)?;
        info!(
            "{} finished: {} deleted, {} installed",
            mode,
            report.deleted.len(),
            report.installed.len()
        );
        self.status.line(&format!(
            "Updates installed; rebooting in {} seconds...",
            self.reboot_delay.as_secs()
        ));
        self.restart()?;
        Ok(report)
    }

    /// Privileged-access check only, then the success path
    pub fn self_test(&mut self) -> Result<AccessGrant> {
        let grant = self.acquire_access()?;
        self.status.line(&format!(
            "Tested access ({}); rebooting in {} seconds...",
            grant,
            self.reboot_delay.as_secs()
        ));
        self.restart()?;
        Ok(grant)
    }

    fn acquire_access(&mut self) -> Result<AccessGrant> {
        match self.platform.acquire_access() {
            Ok(grant) => {
                debug!("Package manager access: {}", grant);
                Ok(grant)
            }
            Err(err) => {
                self.status.error("Did not get package manager access, please reboot");
                Err(err)
            }
        }
    }

    fn restart(&mut self) -> Result<()> {
        if !self.reboot_delay.is_zero() {
            std::thread::sleep(self.reboot_delay);
        }
        self.platform.restart()
    }

    /// Print the diagnostic, its code and the remediation hint
    pub fn report_error(&self, err: &Error) {
        warn!("Session failed: {}", err);
        self.status.error(&err.to_string());
        self.status.error(&format!("Error code: {}", err.kind()));
        if let Some(hint) = err.remediation() {
            self.status.error(hint);
        }
    }
}
