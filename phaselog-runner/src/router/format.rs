// Copyright (c) The phaselog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Line formats for the command-line, global and per-phase sinks.

use super::Severity;
use chrono::{DateTime, Local};
use owo_colors::{OwoColorize, Style};
use std::fmt;

/// Step numbering attached to an entry.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub(crate) enum StepLabel {
    #[default]
    None,
    Step(u32),
    Substep(u32, u32),
}

impl fmt::Display for StepLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => Ok(()),
            Self::Step(step) => write!(f, " {step}"),
            Self::Substep(step, substep) => write!(f, " {step}.{substep}"),
        }
    }
}

/// Step and substep counters. Reset at the start of each invocation.
#[derive(Clone, Debug, Default)]
pub(crate) struct StepCounter {
    step: u32,
    substep: u32,
}

impl StepCounter {
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    /// Advances the counters for an entry at `severity` and returns its label.
    pub(crate) fn advance(&mut self, severity: Severity) -> StepLabel {
        match severity {
            Severity::Step => {
                self.step += 1;
                self.substep = 0;
                StepLabel::Step(self.step)
            }
            Severity::Substep => self.next_substep(),
            _ => StepLabel::None,
        }
    }

    pub(crate) fn next_substep(&mut self) -> StepLabel {
        self.substep += 1;
        StepLabel::Substep(self.step, self.substep)
    }
}

/// A single formatted-but-unrendered log entry.
#[derive(Clone, Debug)]
pub(crate) struct LogEntry<'a> {
    pub(crate) timestamp: DateTime<Local>,
    pub(crate) severity: Severity,
    pub(crate) step: StepLabel,
    pub(crate) message: &'a str,
}

impl LogEntry<'_> {
    /// The format used by log files, the global log and the run metadata store.
    pub(crate) fn file_line(&self) -> String {
        format!(
            "{} [{}{}] - {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.severity.label(),
            self.step,
            self.message,
        )
    }

    /// The format used by the command-line sink.
    pub(crate) fn cmd_line(&self, prefix: &CmdPrefix, styles: &LogStyles) -> String {
        let line = match prefix {
            CmdPrefix::Outside => {
                format!("[{}{}] - {}", self.severity.label(), self.step, self.message)
            }
            CmdPrefix::Setup { filename, testcase } => format!(
                "{filename}/{testcase} [SETUP][{}{}] - {}",
                self.severity.label(),
                self.step,
                self.message,
            ),
            CmdPrefix::Test { filename, testcase } => format!(
                "{filename}/{testcase} [{}{}] - {}",
                self.severity.label(),
                self.step,
                self.message,
            ),
        };

        if styles.is_colorized {
            line.style(styles.for_severity(self.severity)).to_string()
        } else {
            line
        }
    }
}

/// The test context shown before each command-line entry.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) enum CmdPrefix {
    #[default]
    Outside,
    Setup {
        filename: String,
        testcase: String,
    },
    Test {
        filename: String,
        testcase: String,
    },
}

/// Renders a register read/write entry.
pub(crate) fn register_message(name: &str, write: i64, read: i64) -> String {
    format!(
        "{name}: {} (Readback: {})",
        RegisterValue(write),
        RegisterValue(read)
    )
}

struct RegisterValue(i64);

impl fmt::Display for RegisterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 0 {
            write!(f, "{}", self.0)
        } else {
            write!(f, "{:#x}", self.0)
        }
    }
}

/// Colors for command-line entries, by severity.
#[derive(Clone, Debug, Default)]
pub struct LogStyles {
    is_colorized: bool,
    debug: Style,
    step: Style,
    pass: Style,
    warning: Style,
    fail: Style,
    error: Style,
    critical: Style,
}

impl LogStyles {
    /// Enables colorized output.
    pub fn colorize(&mut self) {
        self.is_colorized = true;
        self.debug = Style::new().dimmed();
        self.step = Style::new().cyan().bold();
        self.pass = Style::new().green();
        self.warning = Style::new().yellow();
        self.fail = Style::new().red();
        self.error = Style::new().red().bold();
        self.critical = Style::new().red().bold().underline();
    }

    fn for_severity(&self, severity: Severity) -> Style {
        match severity {
            Severity::Debug => self.debug,
            Severity::Info => Style::new(),
            Severity::Step | Severity::Substep => self.step,
            Severity::Pass | Severity::RwOk => self.pass,
            Severity::Warning => self.warning,
            Severity::Fail | Severity::RwFailed => self.fail,
            Severity::Error => self.error,
            Severity::Critical => self.critical,
        }
    }
}
