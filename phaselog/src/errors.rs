// Copyright (c) The phaselog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING, StderrStyles};
use camino::Utf8PathBuf;
use owo_colors::OwoColorize;
use phaselog_metadata::{PhaselogExitCode, SummaryReadError};
use phaselog_runner::errors::{
    ConfigParseError, EventReadError, ExportError, ProfileNotFound, ReplayError,
};
use std::error::Error;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// Note that the #[error()] strings are mostly placeholder messages -- the expected way to print out
// errors is with the display_to_stderr method, which colorizes errors.

/// An expected error that phaselog reports and exits with a documented code.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not determine the current directory")]
    CurrentDirFailed { err: std::io::Error },
    #[error("workspace root is not valid UTF-8")]
    WorkspaceRootInvalidUtf8 { path: std::path::PathBuf },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("profile not found")]
    ProfileNotFound {
        #[from]
        err: ProfileNotFound,
    },
    #[error("failed to read event stream")]
    EventReadError {
        path: Utf8PathBuf,
        #[source]
        err: EventReadError,
    },
    #[error("failed to replay event stream")]
    ReplayError {
        path: Utf8PathBuf,
        #[source]
        err: ReplayError,
    },
    #[error("failed to read session export document")]
    SummaryReadError {
        #[from]
        err: SummaryReadError,
    },
    #[error("failed to write session exports")]
    ExportError {
        #[from]
        err: ExportError,
    },
    #[error("error writing output")]
    WriteOutputError {
        #[source]
        err: std::io::Error,
    },
}

impl ExpectedError {
    pub(crate) fn event_read_error(path: impl Into<Utf8PathBuf>, err: EventReadError) -> Self {
        Self::EventReadError {
            path: path.into(),
            err,
        }
    }

    pub(crate) fn replay_error(path: impl Into<Utf8PathBuf>, err: ReplayError) -> Self {
        Self::ReplayError {
            path: path.into(),
            err,
        }
    }

    pub(crate) fn write_output_error(err: std::io::Error) -> Self {
        Self::WriteOutputError { err }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirFailed { .. }
            | Self::WorkspaceRootInvalidUtf8 { .. }
            | Self::ConfigParseError { .. }
            | Self::ProfileNotFound { .. } => PhaselogExitCode::SETUP_ERROR,
            Self::EventReadError { .. } | Self::ReplayError { .. } => {
                PhaselogExitCode::EVENT_STREAM_INVALID
            }
            Self::SummaryReadError { .. } => PhaselogExitCode::EXPORT_DOCUMENT_INVALID,
            Self::ExportError { .. } => PhaselogExitCode::EXPORT_FAILED,
            Self::WriteOutputError { .. } => PhaselogExitCode::WRITE_OUTPUT_ERROR,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match &self {
            Self::CurrentDirFailed { err } => {
                error!("could not determine the current directory");
                Some(err as &dyn Error)
            }
            Self::WorkspaceRootInvalidUtf8 { path } => {
                error!(
                    "workspace root `{}` is not valid UTF-8",
                    path.display().style(styles.bold)
                );
                None
            }
            Self::ConfigParseError { err } => {
                error!(
                    "failed to parse phaselog config at `{}`",
                    err.config_file().style(styles.bold)
                );
                Some(err.kind() as &dyn Error)
            }
            Self::ProfileNotFound { err } => {
                error!("{}", err);
                err.source()
            }
            Self::EventReadError { path, err } => {
                error!("failed to read event stream `{}`", path.style(styles.bold));
                Some(err as &dyn Error)
            }
            Self::ReplayError { path, err } => {
                error!(
                    "event stream `{}` is not well-formed",
                    path.style(styles.bold)
                );
                Some(err as &dyn Error)
            }
            Self::SummaryReadError { err } => {
                error!("{}", err);
                err.source()
            }
            Self::ExportError { err } => {
                error!("{}", err);
                err.source()
            }
            Self::WriteOutputError { err } => {
                error!("error writing output");
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            error!(
                target: NO_HEADING,
                "\n{}\n  {}",
                "Caused by:".style(styles.warning_text),
                err
            );
            next_error = err.source();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        let err = ExpectedError::replay_error(
            "events.jsonl",
            ReplayError::UnterminatedFakeSetup { position: 3 },
        );
        assert_eq!(err.process_exit_code(), PhaselogExitCode::EVENT_STREAM_INVALID);

        let err = ExpectedError::write_output_error(std::io::Error::other("broken pipe"));
        assert_eq!(err.process_exit_code(), PhaselogExitCode::WRITE_OUTPUT_ERROR);
    }
}
