// Copyright (c) The phaselog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! General support code for phaselog-runner.

use camino::Utf8Path;
use std::{fmt, time::Duration};

/// Utilities for pluralizing various words based on count or plurality.
pub mod plural {
    /// Returns "invocation" if `count` is 1, otherwise "invocations".
    pub fn invocations_str(count: usize) -> &'static str {
        if count == 1 { "invocation" } else { "invocations" }
    }

    /// Returns "test" if `count` is 1, otherwise "tests".
    pub fn tests_str(count: usize) -> &'static str {
        if count == 1 { "test" } else { "tests" }
    }

    /// Returns "fault" if `count` is 1, otherwise "faults".
    pub fn faults_str(count: usize) -> &'static str {
        if count == 1 { "fault" } else { "faults" }
    }
}

#[derive(Debug)]
pub(crate) struct FormattedDuration(pub(crate) Duration);

impl fmt::Display for FormattedDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let duration = self.0.as_secs_f64();
        if duration > 60.0 {
            write!(f, "{}m {:.2}s", duration as u32 / 60, duration % 60.0)
        } else {
            write!(f, "{duration:.2}s")
        }
    }
}

/// Returns the final component of a source path, accepting both `/` and `\` separators.
///
/// Runner contexts may come from another platform via an event stream, so this can't rely on
/// [`Utf8Path::file_name`] alone.
pub(crate) fn source_basename(path: &Utf8Path) -> Option<&str> {
    let name = path.as_str().rsplit(['/', '\\']).next()?;
    (!name.is_empty()).then_some(name)
}
