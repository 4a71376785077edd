// Copyright (c) The phaselog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-phase log files.
//!
//! A destination is opened under a provisional name carrying the pending marker `X`, and renamed
//! to carry the phase's outcome marker once the phase is over.

use crate::{errors::DestinationError, identity::TestInvocationKey};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Local};
use phaselog_metadata::{Phase, PhaseStatus};
use std::{
    fs::{File, OpenOptions},
    io::{self, Write},
};
use tracing::debug;

const PENDING_MARKER: char = 'X';

/// The kind of phase a destination receives lines for. Teardown never gets its own file.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DestinationKind {
    /// A setup phase, including fake setup scopes.
    Setup,

    /// A call phase.
    Call,
}

impl DestinationKind {
    /// Returns the phase whose record receives this destination's lines.
    pub fn phase(self) -> Phase {
        match self {
            Self::Setup => Phase::Setup,
            Self::Call => Phase::Call,
        }
    }
}

/// The components of a log file name.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct LogFileName {
    timestamp: String,
    filename: String,
    testcase: String,
    kind: DestinationKind,
    index: usize,
}

impl LogFileName {
    pub(crate) fn new(key: &TestInvocationKey, kind: DestinationKind, now: DateTime<Local>) -> Self {
        Self {
            timestamp: now.format("%Y-%m-%d_%H-%M-%S").to_string(),
            filename: key.filename.clone(),
            testcase: key.testcase.clone(),
            kind,
            index: key.index,
        }
    }

    /// Renders the name with the given marker and an optional collision disambiguator.
    pub(crate) fn render(&self, marker: char, disambiguator: Option<usize>) -> String {
        let setup = match self.kind {
            DestinationKind::Setup => "_setup",
            DestinationKind::Call => "",
        };
        let suffix = disambiguator.map_or_else(String::new, |n| format!("-{n}"));
        format!(
            "{}_{marker}_{}_{}{setup}_{}{suffix}.log",
            self.timestamp, self.filename, self.testcase, self.index,
        )
    }
}

/// An open per-phase log sink bound to one invocation and one phase kind.
#[derive(Debug)]
pub struct LiveDestination {
    key: TestInvocationKey,
    kind: DestinationKind,
    dir: Utf8PathBuf,
    name: LogFileName,
    // Disambiguates provisional files for the same name that are open at the same time.
    provisional: Option<usize>,
    // None if the file couldn't be opened or a write failed.
    file: Option<File>,
    masked: bool,
}

impl LiveDestination {
    /// Opens a destination under its provisional name.
    ///
    /// The provisional file is always newly created. If another open destination already holds
    /// the name, a `-N` disambiguator is added.
    ///
    /// If the file can't be created, the destination is returned detached along with the error:
    /// masking and store accumulation still work, but no file is written.
    pub(crate) fn open(
        dir: &Utf8Path,
        key: TestInvocationKey,
        kind: DestinationKind,
        now: DateTime<Local>,
    ) -> (Self, Option<DestinationError>) {
        let name = LogFileName::new(&key, kind, now);
        let mut destination = Self {
            key,
            kind,
            dir: dir.to_owned(),
            name,
            provisional: None,
            file: None,
            masked: false,
        };

        let error = match destination.create_provisional() {
            Ok(file) => {
                debug!(path = %destination.provisional_path(), "opened log destination");
                destination.file = Some(file);
                None
            }
            Err(error) => Some(error),
        };
        (destination, error)
    }

    /// Returns the invocation this destination belongs to.
    pub fn key(&self) -> &TestInvocationKey {
        &self.key
    }

    /// Returns the kind of phase this destination receives lines for.
    pub fn kind(&self) -> DestinationKind {
        self.kind
    }

    /// Returns true if log calls are currently suppressed for this destination.
    pub fn is_masked(&self) -> bool {
        self.masked
    }

    /// Returns true if the destination has no file.
    pub fn is_detached(&self) -> bool {
        self.file.is_none()
    }

    /// Returns the path of the file while the phase is pending.
    pub fn provisional_path(&self) -> Utf8PathBuf {
        self.dir.join(self.name.render(PENDING_MARKER, self.provisional))
    }

    pub(crate) fn mask(&mut self) {
        self.masked = true;
    }

    pub(crate) fn unmask(&mut self) {
        self.masked = false;
    }

    /// Writes a line. A failed write detaches the destination.
    pub(crate) fn write_line(&mut self, line: &str) -> Result<(), DestinationError> {
        let Some(file) = &mut self.file else {
            return Ok(());
        };

        let res = file
            .write_all(line.as_bytes())
            .and_then(|()| file.write_all(b"\n"))
            .and_then(|()| file.flush());
        res.map_err(|error| {
            self.file = None;
            DestinationError::Write {
                path: self.provisional_path(),
                error,
            }
        })
    }

    /// Closes the file and renames it to carry the marker for `status`.
    ///
    /// Returns the final path, or `None` if the provisional file no longer exists.
    pub(crate) fn finalize(mut self, status: PhaseStatus) -> Result<Option<Utf8PathBuf>, DestinationError> {
        // Close before renaming.
        self.file.take();

        let from = self.provisional_path();
        if !from.exists() {
            debug!(path = %from, "provisional log file is gone, skipping rename");
            return Ok(None);
        }

        let to = self.final_path(status.marker());
        std::fs::rename(&from, &to).map_err(|error| DestinationError::Rename {
            from: from.clone(),
            to: to.clone(),
            error,
        })?;

        debug!(%from, %to, "finalized log destination");
        Ok(Some(to))
    }

    fn final_path(&self, marker: char) -> Utf8PathBuf {
        let candidate = self.dir.join(self.name.render(marker, None));
        if !candidate.exists() {
            return candidate;
        }
        (1..)
            .map(|n| self.dir.join(self.name.render(marker, Some(n))))
            .find(|path| !path.exists())
            .unwrap_or(candidate)
    }
}

impl LiveDestination {
    fn create_provisional(&mut self) -> Result<File, DestinationError> {
        std::fs::create_dir_all(&self.dir).map_err(|error| DestinationError::CreateDir {
            dir: self.dir.clone(),
            error,
        })?;

        loop {
            let path = self.provisional_path();
            match OpenOptions::new().append(true).create_new(true).open(&path) {
                Ok(file) => return Ok(file),
                Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {
                    self.provisional = Some(self.provisional.map_or(1, |n| n + 1));
                }
                Err(error) => return Err(DestinationError::Open { path, error }),
            }
        }
    }
}
