// Copyright (c) The phaselog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by phaselog.
//!
//! None of the errors in this module are ever raised into the test runner's control flow. Errors
//! that occur while a session is in progress are recorded as [`SessionFault`]s and the session
//! continues in a degraded state.

use crate::{identity::TestInvocationKey, router::Severity};
use camino::Utf8PathBuf;
use config::ConfigError;
use std::{error::Error, fmt};
use thiserror::Error;

/// The runner supplied incomplete context while a test identity was being resolved.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ContextError {
    /// The runner context had no source file.
    #[error("runner context is missing a source filename")]
    MissingFilename,

    /// The runner context had no test case name.
    #[error("runner context for `{filename}` is missing a test case name")]
    MissingTestcase {
        /// The filename that was resolved.
        filename: String,
    },
}

/// An invocation was started at an index that is already occupied, or that would leave a gap.
///
/// This indicates a sequencing bug between identity resolution and the run metadata store, and
/// should never be observed in practice.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("invocation {key} cannot be started: the next free index is {next_index}")]
pub struct DuplicateInvocationError {
    key: TestInvocationKey,
    next_index: usize,
}

impl DuplicateInvocationError {
    pub(crate) fn new(key: TestInvocationKey, next_index: usize) -> Self {
        Self { key, next_index }
    }

    /// Returns the key that was rejected.
    pub fn key(&self) -> &TestInvocationKey {
        &self.key
    }

    /// Returns the next free index for the key's `(filename, testcase)` bucket.
    pub fn next_index(&self) -> usize {
        self.next_index
    }
}

/// An error that occurred while operating on a log destination.
#[derive(Debug, Error)]
pub enum DestinationError {
    /// The directory for log files could not be created.
    #[error("failed to create log directory `{dir}`")]
    CreateDir {
        /// The directory.
        dir: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// A log file could not be opened.
    #[error("failed to open log file `{path}`")]
    Open {
        /// The file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// A log line could not be written.
    #[error("failed to write to log file `{path}`")]
    Write {
        /// The file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// A finalized log file could not be renamed.
    #[error("failed to rename log file `{from}` to `{to}`")]
    Rename {
        /// The provisional path.
        from: Utf8PathBuf,

        /// The outcome-marked path.
        to: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },
}

/// An error that occurred while exporting the run metadata store.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The directory for the export could not be created.
    #[error("failed to create export directory `{dir}`")]
    CreateDir {
        /// The directory.
        dir: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The export document could not be serialized.
    #[error("failed to serialize session export document for `{path}`")]
    Serialize {
        /// The output path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },

    /// The JUnit report could not be serialized.
    #[error("failed to serialize JUnit report for `{path}`")]
    Junit {
        /// The output path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: quick_junit::SerializeError,
    },

    /// The output file could not be written.
    #[error("failed to write `{path}`")]
    Write {
        /// The output path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: atomicwrites::Error<std::io::Error>,
    },
}

/// A problem recorded while a session was in progress.
///
/// Faults never abort a session. They are logged through `tracing`, echoed to the command line at
/// warning severity, and kept on the session for later inspection.
#[derive(Debug, Error)]
pub enum SessionFault {
    /// A test identity could not be resolved; logging is disabled for that test.
    #[error("test identity could not be resolved")]
    Context(#[from] ContextError),

    /// The run metadata store rejected an invocation.
    #[error("run metadata store rejected an invocation")]
    DuplicateInvocation(#[from] DuplicateInvocationError),

    /// A log destination failed; its file output is lost for this invocation.
    #[error("log destination failed")]
    Destination(#[from] DestinationError),
}

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse phaselog config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing a config.
///
/// Returned by [`ConfigParseError::kind`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),

    /// A profile has an invalid setting.
    #[error("invalid profile `{profile}`: {message}")]
    InvalidProfile {
        /// The profile name.
        profile: String,

        /// What is wrong with it.
        message: String,
    },
}

/// An error which indicates that a profile was requested but not known to phaselog.
#[derive(Clone, Debug, Error)]
#[error("profile `{profile}` not found (known profiles: {})", .all_profiles.join(", "))]
pub struct ProfileNotFound {
    profile: String,
    all_profiles: Vec<String>,
}

impl ProfileNotFound {
    pub(crate) fn new(
        profile: impl Into<String>,
        all_profiles: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let mut all_profiles: Vec<_> = all_profiles.into_iter().map(|s| s.into()).collect();
        all_profiles.sort_unstable();
        Self {
            profile: profile.into(),
            all_profiles,
        }
    }
}

/// Error returned while parsing a [`Severity`] value from a string.
#[derive(Clone, Debug, Error)]
#[error(
    "unrecognized value for severity: {input}\n(known values: {})",
    Severity::variants().join(", "),
)]
pub struct SeverityParseError {
    input: String,
}

impl SeverityParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// An error that occurred while reading a stream of runner events.
#[derive(Debug, Error)]
pub enum EventReadError {
    /// The stream could not be read.
    #[error("error reading event stream")]
    Io(#[source] std::io::Error),

    /// A line in the stream is not a valid event.
    #[error("invalid event on line {line}")]
    Parse {
        /// The 1-based line number.
        line: usize,

        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },
}

/// An error that occurred while replaying runner events into a session.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ReplayError {
    /// A `fake-setup-finished` event arrived without a matching `fake-setup-started`.
    #[error("event {position}: fake-setup-finished without a matching fake-setup-started")]
    UnmatchedFakeSetupFinished {
        /// The 0-based position of the event.
        position: usize,
    },

    /// The stream ended inside a fake setup scope.
    #[error("event {position}: fake-setup-started is never finished")]
    UnterminatedFakeSetup {
        /// The 0-based position of the event that opened the scope.
        position: usize,
    },
}

/// Displays an error along with the chain of errors that caused it.
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E: Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        let mut source = self.error.source();
        while let Some(error) = source {
            write!(f, "\n  caused by:\n  - {error}")?;
            source = error.source();
        }

        Ok(())
    }
}
