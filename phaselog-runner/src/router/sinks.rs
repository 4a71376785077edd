// Copyright (c) The phaselog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The command-line and global sinks.

use super::{
    Severity,
    format::{CmdPrefix, LogEntry, LogStyles},
};
use crate::errors::DestinationError;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Local};
use std::{
    fs::{File, OpenOptions},
    io::{self, Write},
};

/// Where command-line entries are written.
#[derive(Debug, Default)]
pub enum CommandLineOutput {
    /// Write to standard output.
    #[default]
    Stdout,

    /// Write to a buffer.
    Buffer(Vec<u8>),

    /// Drop all command-line entries.
    Discard,
}

impl CommandLineOutput {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        match self {
            Self::Stdout => {
                let mut stdout = io::stdout().lock();
                writeln!(stdout, "{line}")?;
                stdout.flush()
            }
            Self::Buffer(buf) => writeln!(buf, "{line}"),
            Self::Discard => Ok(()),
        }
    }
}

#[derive(Debug)]
pub(crate) struct CmdSink {
    output: CommandLineOutput,
    threshold: Severity,
    setup_threshold: Severity,
    styles: LogStyles,
    prefix: CmdPrefix,
}

impl CmdSink {
    pub(crate) fn new(
        output: CommandLineOutput,
        threshold: Severity,
        setup_threshold: Severity,
        styles: LogStyles,
    ) -> Self {
        Self {
            output,
            threshold,
            setup_threshold,
            styles,
            prefix: CmdPrefix::Outside,
        }
    }

    pub(crate) fn set_prefix(&mut self, prefix: CmdPrefix) {
        self.prefix = prefix;
    }

    pub(crate) fn prefix(&self) -> &CmdPrefix {
        &self.prefix
    }

    pub(crate) fn output(&self) -> &CommandLineOutput {
        &self.output
    }

    pub(crate) fn write(&mut self, entry: &LogEntry<'_>) {
        let threshold = match self.prefix {
            CmdPrefix::Setup { .. } => self.setup_threshold,
            CmdPrefix::Test { .. } | CmdPrefix::Outside => self.threshold,
        };
        if !entry.severity.passes(threshold) {
            return;
        }

        let line = entry.cmd_line(&self.prefix, &self.styles);
        // A closed stdout isn't worth faulting the session over.
        if let Err(error) = self.output.write_line(&line) {
            tracing::debug!(%error, "failed to write to command line");
        }
    }
}

/// The whole-session log file, `<timestamp>_all.log`.
#[derive(Debug)]
pub(crate) struct GlobalSink {
    path: Utf8PathBuf,
    file: Option<File>,
    threshold: Severity,
}

impl GlobalSink {
    pub(crate) fn open(
        dir: &Utf8Path,
        now: DateTime<Local>,
        threshold: Severity,
    ) -> Result<Self, DestinationError> {
        std::fs::create_dir_all(dir).map_err(|error| DestinationError::CreateDir {
            dir: dir.to_owned(),
            error,
        })?;

        let path = dir.join(format!("{}_all.log", now.format("%Y-%m-%d_%H-%M-%S")));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|error| DestinationError::Open {
                path: path.clone(),
                error,
            })?;

        Ok(Self {
            path,
            file: Some(file),
            threshold,
        })
    }

    pub(crate) fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Writes an entry if it passes the threshold. A failed write closes the sink.
    pub(crate) fn write(&mut self, entry: &LogEntry<'_>, line: &str) -> Result<(), DestinationError> {
        if !entry.severity.passes(self.threshold) {
            return Ok(());
        }
        let Some(file) = &mut self.file else {
            return Ok(());
        };

        let res = writeln!(file, "{line}").and_then(|()| file.flush());
        res.map_err(|error| {
            self.file = None;
            DestinationError::Write {
                path: self.path.clone(),
                error,
            }
        })
    }
}
