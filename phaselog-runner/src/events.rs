// Copyright (c) The phaselog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runner events expressed as JSON lines.
//!
//! Runners that don't drive a [`SessionContext`](crate::session::SessionContext) in-process can
//! write their hook events to a file, one JSON object per line, tagged by `"event"`:
//!
//! ```text
//! {"event": "setup-started", "path": "tests/test_mod.py", "testcase": "test_foo", "params": {"x": 1}}
//! {"event": "setup-finished", "exception": "none"}
//! {"event": "call-started"}
//! {"event": "log", "level": "step", "message": "power on"}
//! {"event": "register", "name": "CTRL", "write": 5, "read": 5}
//! {"event": "call-finished", "exception": "fail", "duration": 0.25}
//! {"event": "teardown-started"}
//! {"event": "teardown-finished"}
//! ```
//!
//! Blank lines and lines starting with `#` are ignored.

use crate::{
    errors::EventReadError,
    lifecycle::{ExceptionKind, PhaseOutcome},
    router::Severity,
    time::PhaseTiming,
};
use camino::Utf8PathBuf;
use chrono::{DateTime, FixedOffset};
use phaselog_metadata::TestInputs;
use serde::{Deserialize, Serialize};
use std::io::BufRead;

/// A single runner hook event or log call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum RunnerEvent {
    /// A test's setup started.
    SetupStarted {
        /// The path to the test's source file.
        #[serde(default)]
        path: Option<Utf8PathBuf>,

        /// The test function name.
        #[serde(default)]
        testcase: Option<String>,

        /// Parametrization values.
        #[serde(default)]
        params: TestInputs,
    },

    /// A test's setup ended.
    SetupFinished(EventOutcome),

    /// A test's body started.
    CallStarted,

    /// A test's body ended.
    CallFinished(EventOutcome),

    /// A test's teardown started.
    TeardownStarted,

    /// A test's teardown ended.
    TeardownFinished(EventOutcome),

    /// A log call.
    Log {
        /// The severity of the entry.
        level: Severity,

        /// The message.
        message: String,
    },

    /// A register write and its read-back.
    Register {
        /// The register name.
        name: String,

        /// The value written.
        write: i64,

        /// The value read back.
        read: i64,
    },

    /// Free text logged alongside register entries.
    RwMessage {
        /// The message.
        message: String,
    },

    /// A fake setup scope was entered.
    FakeSetupStarted,

    /// A fake setup scope was left.
    FakeSetupFinished {
        /// How the scope ended.
        #[serde(default)]
        exception: ExceptionKind,
    },
}

impl RunnerEvent {
    /// Parses events from JSON lines.
    pub fn parse_lines(input: &str) -> Result<Vec<Self>, EventReadError> {
        input
            .lines()
            .enumerate()
            .filter_map(|(n, line)| parse_line(n + 1, line).transpose())
            .collect()
    }

    /// Reads events from a stream of JSON lines.
    pub fn read_from(reader: impl BufRead) -> Result<Vec<Self>, EventReadError> {
        let mut events = Vec::new();
        for (n, line) in reader.lines().enumerate() {
            let line = line.map_err(EventReadError::Io)?;
            events.extend(parse_line(n + 1, &line)?);
        }
        Ok(events)
    }
}

fn parse_line(line_number: usize, line: &str) -> Result<Option<RunnerEvent>, EventReadError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(line)
        .map(Some)
        .map_err(|error| EventReadError::Parse {
            line: line_number,
            error,
        })
}

/// The outcome carried by a `*-finished` event.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventOutcome {
    /// How the phase ended.
    #[serde(default)]
    pub exception: ExceptionKind,

    /// When the phase started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<FixedOffset>>,

    /// When the phase stopped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<DateTime<FixedOffset>>,

    /// How long the phase took, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl EventOutcome {
    /// Converts this into a [`PhaseOutcome`].
    ///
    /// Explicit timing is used only if both `start` and `stop` are present. A missing duration is
    /// computed from them.
    pub fn to_outcome(&self) -> PhaseOutcome {
        let outcome = PhaseOutcome::new(self.exception);
        match (self.start, self.stop) {
            (Some(start), Some(stop)) => {
                let duration = self.duration.unwrap_or_else(|| {
                    (stop - start)
                        .to_std()
                        .map_or(0.0, |duration| duration.as_secs_f64())
                });
                outcome.with_timing(PhaseTiming {
                    start,
                    stop,
                    duration,
                })
            }
            _ => outcome,
        }
    }
}
