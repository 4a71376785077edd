// Copyright (c) The phaselog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The log router.
//!
//! Every structured log call made during a session passes through the [`LogRouter`]. An entry is
//! written to the command line and the global log, each filtered by its own threshold, and then
//! routed to the current unmasked [`LiveDestination`] and appended to that destination's phase
//! record in the run metadata store.
//!
//! Multiple destinations can be open at once (a setup destination opened while a call destination
//! is live), but at most one is unmasked and receiving at any time.

mod destination;
mod format;
mod severity;
mod sinks;

pub use destination::{DestinationKind, LiveDestination};
pub(crate) use format::CmdPrefix;
pub use format::LogStyles;
pub use severity::Severity;
pub use sinks::CommandLineOutput;

use crate::{
    errors::{DisplayErrorChain, SessionFault},
    identity::TestInvocationKey,
    store::RunMetadataStore,
};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Local;
use format::{LogEntry, StepCounter, StepLabel, register_message};
use phaselog_metadata::{Phase, PhaseStatus};
use sinks::{CmdSink, GlobalSink};
use tracing::warn;

/// Settings for a [`LogRouter`].
#[derive(Clone, Debug)]
pub struct RouterSettings {
    /// Directory for per-phase and global log files.
    pub log_dir: Utf8PathBuf,

    /// Entries below this severity are dropped everywhere.
    pub level: Severity,

    /// Threshold for the command line.
    pub cmd_level: Severity,

    /// Threshold for the command line while a setup phase is current.
    pub setup_cmd_level: Severity,

    /// Threshold for per-phase log files.
    pub file_level: Severity,

    /// Threshold for the global log.
    pub global_level: Severity,

    /// Whether to write the global log.
    pub global_log: bool,

    /// Whether register entries count as substeps.
    pub rw_substeps: bool,

    /// Command-line colors.
    pub styles: LogStyles,
}

impl RouterSettings {
    /// Creates settings with every threshold at [`Severity::Info`].
    pub fn new(log_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            level: Severity::Info,
            cmd_level: Severity::Info,
            setup_cmd_level: Severity::Info,
            file_level: Severity::Info,
            global_level: Severity::Info,
            global_log: true,
            rw_substeps: false,
            styles: LogStyles::default(),
        }
    }
}

#[derive(Debug)]
struct TeardownRoute {
    key: TestInvocationKey,
    warned: bool,
}

/// Owns the command-line and global sinks and the live per-phase destinations.
#[derive(Debug)]
pub struct LogRouter {
    log_dir: Utf8PathBuf,
    level: Severity,
    file_level: Severity,
    rw_substeps: bool,
    cmd: CmdSink,
    global: Option<GlobalSink>,
    destinations: Vec<LiveDestination>,
    teardown: Option<TeardownRoute>,
    steps: StepCounter,
    faults: Vec<SessionFault>,
}

impl LogRouter {
    /// Creates a router, opening the global log if enabled.
    pub fn new(settings: RouterSettings, output: CommandLineOutput) -> Self {
        let cmd = CmdSink::new(
            output,
            settings.cmd_level,
            settings.setup_cmd_level,
            settings.styles,
        );
        let mut router = Self {
            log_dir: settings.log_dir,
            level: settings.level,
            file_level: settings.file_level,
            rw_substeps: settings.rw_substeps,
            cmd,
            global: None,
            destinations: Vec::new(),
            teardown: None,
            steps: StepCounter::default(),
            faults: Vec::new(),
        };

        if settings.global_log {
            match GlobalSink::open(&router.log_dir, Local::now(), settings.global_level) {
                Ok(global) => router.global = Some(global),
                Err(error) => router.report_fault(error.into()),
            }
        }
        router
    }

    /// Returns the directory log files are written to.
    pub fn log_dir(&self) -> &Utf8Path {
        &self.log_dir
    }

    /// Returns the path of the global log, if it's open.
    pub fn global_log_path(&self) -> Option<&Utf8Path> {
        self.global.as_ref().map(GlobalSink::path)
    }

    /// Returns the command-line output.
    pub fn cmd_output(&self) -> &CommandLineOutput {
        self.cmd.output()
    }

    /// Returns the faults recorded so far.
    pub fn faults(&self) -> &[SessionFault] {
        &self.faults
    }

    /// Returns the destinations that are currently open, oldest first.
    pub fn destinations(&self) -> &[LiveDestination] {
        &self.destinations
    }

    /// Returns the destination currently receiving lines, if any.
    pub fn active_destination(&self) -> Option<&LiveDestination> {
        let teardown_key = self.teardown.as_ref().map(|route| &route.key);
        self.destinations
            .iter()
            .rev()
            .find(|d| !d.is_masked() && teardown_key.is_none_or(|key| d.key() == key))
    }

    /// Logs a message at `severity`, advancing the step counters for steps and substeps.
    pub(crate) fn log(&mut self, store: &mut RunMetadataStore, severity: Severity, message: &str) {
        let step = self.steps.advance(severity);
        self.emit(store, severity, step, message);
    }

    /// Logs a register read/write entry and returns whether the values matched.
    pub(crate) fn rw(
        &mut self,
        store: &mut RunMetadataStore,
        name: &str,
        write: i64,
        read: i64,
    ) -> bool {
        let matched = write == read;
        let severity = if matched {
            Severity::RwOk
        } else {
            Severity::RwFailed
        };
        let step = self.rw_step();
        self.emit(store, severity, step, &register_message(name, write, read));
        matched
    }

    /// Logs free text at [`Severity::RwOk`].
    pub(crate) fn rw_message(&mut self, store: &mut RunMetadataStore, text: &str) {
        let step = self.rw_step();
        self.emit(store, Severity::RwOk, step, text);
    }

    fn rw_step(&mut self) -> StepLabel {
        if self.rw_substeps {
            self.steps.next_substep()
        } else {
            StepLabel::None
        }
    }

    fn emit(
        &mut self,
        store: &mut RunMetadataStore,
        severity: Severity,
        step: StepLabel,
        message: &str,
    ) {
        if !severity.passes(self.level) {
            return;
        }

        let entry = LogEntry {
            timestamp: Local::now(),
            severity,
            step,
            message,
        };
        self.cmd.write(&entry);

        let line = entry.file_line();
        let mut errors = Vec::new();
        if let Some(global) = &mut self.global {
            if let Err(error) = global.write(&entry, &line) {
                errors.push(error);
            }
        }

        let file_level = self.file_level;
        // While an invocation is in teardown, only its own destinations receive lines.
        let teardown_key = self.teardown.as_ref().map(|route| &route.key);
        if let Some(destination) = self
            .destinations
            .iter_mut()
            .rev()
            .find(|d| !d.is_masked() && teardown_key.is_none_or(|key| d.key() == key))
        {
            if severity.passes(file_level) {
                if let Err(error) = destination.write_line(&line) {
                    errors.push(error);
                }
            }
            store.append_log(destination.key(), destination.kind().phase(), &line);
        } else if let Some(route) = &mut self.teardown {
            if store.has_phase(&route.key, Phase::Call) {
                store.append_log(&route.key, Phase::Call, &line);
            } else if !route.warned {
                route.warned = true;
                warn!(
                    invocation = %route.key,
                    "dropping teardown log lines: invocation has no call record",
                );
            }
        }

        for error in errors {
            self.report_fault(error.into());
        }
    }

    /// Records a fault: logs it, echoes it to the command line and keeps it.
    pub(crate) fn report_fault(&mut self, fault: SessionFault) {
        let message = DisplayErrorChain::new(&fault).to_string();
        warn!("{message}");
        self.cmd.write(&LogEntry {
            timestamp: Local::now(),
            severity: Severity::Warning,
            step: StepLabel::None,
            message: &message,
        });
        self.faults.push(fault);
    }

    pub(crate) fn reset_steps(&mut self) {
        self.steps.reset();
    }

    pub(crate) fn set_prefix(&mut self, prefix: CmdPrefix) {
        self.cmd.set_prefix(prefix);
    }

    pub(crate) fn prefix(&self) -> &CmdPrefix {
        self.cmd.prefix()
    }

    /// Opens a destination and makes it the active one.
    pub(crate) fn open_destination(&mut self, key: &TestInvocationKey, kind: DestinationKind) {
        let (destination, error) =
            LiveDestination::open(&self.log_dir, key.clone(), kind, Local::now());
        self.destinations.push(destination);
        if let Some(error) = error {
            self.report_fault(error.into());
        }
    }

    pub(crate) fn has_destination(&self, key: &TestInvocationKey, kind: DestinationKind) -> bool {
        self.position(key, kind).is_some()
    }

    /// Masks the destination, returning true if it was open and unmasked.
    pub(crate) fn mask(&mut self, key: &TestInvocationKey, kind: DestinationKind) -> bool {
        match self.position(key, kind) {
            Some(pos) if !self.destinations[pos].is_masked() => {
                self.destinations[pos].mask();
                true
            }
            _ => false,
        }
    }

    pub(crate) fn unmask(&mut self, key: &TestInvocationKey, kind: DestinationKind) {
        if let Some(pos) = self.position(key, kind) {
            self.destinations[pos].unmask();
        }
    }

    /// Closes the destination and renames its file for `status`.
    pub(crate) fn close_destination(
        &mut self,
        key: &TestInvocationKey,
        kind: DestinationKind,
        status: PhaseStatus,
    ) -> Option<Utf8PathBuf> {
        // Fake setup scopes nest, so close the most recent one.
        let pos = self.position(key, kind)?;
        let destination = self.destinations.remove(pos);
        match destination.finalize(status) {
            Ok(path) => path,
            Err(error) => {
                self.report_fault(error.into());
                None
            }
        }
    }

    pub(crate) fn begin_teardown(&mut self, key: &TestInvocationKey) {
        self.teardown = Some(TeardownRoute {
            key: key.clone(),
            warned: false,
        });
    }

    pub(crate) fn end_teardown(&mut self) {
        self.teardown = None;
    }

    fn position(&self, key: &TestInvocationKey, kind: DestinationKind) -> Option<usize> {
        self.destinations
            .iter()
            .rposition(|d| d.key() == key && d.kind() == kind)
    }
}
