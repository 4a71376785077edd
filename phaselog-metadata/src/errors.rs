// Copyright (c) The phaselog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8PathBuf;
use std::{error, fmt};

/// An error that occurs while reading a session export document.
#[derive(Debug)]
pub enum SummaryReadError {
    /// The document could not be read from disk.
    Read {
        /// The path that was being read.
        path: Utf8PathBuf,

        /// The underlying error.
        error: std::io::Error,
    },

    /// The document is not valid JSON, or doesn't match the expected shape.
    Json {
        /// The path that was being read, if the document came from a file.
        path: Option<Utf8PathBuf>,

        /// The underlying error.
        error: serde_json::Error,
    },
}

impl fmt::Display for SummaryReadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Read { path, .. } => {
                write!(f, "failed to read session export document at `{path}`")
            }
            Self::Json {
                path: Some(path), ..
            } => {
                write!(f, "failed to parse session export document at `{path}`")
            }
            Self::Json { path: None, .. } => {
                write!(f, "failed to parse session export document")
            }
        }
    }
}

impl error::Error for SummaryReadError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Read { error, .. } => Some(error),
            Self::Json { error, .. } => Some(error),
        }
    }
}
