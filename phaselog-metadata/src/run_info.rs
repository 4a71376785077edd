// Copyright (c) The phaselog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::SummaryReadError;
use camino::Utf8Path;
use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, time::Duration};

/// Parametrization values captured for a call phase, keyed by argument name.
pub type TestInputs = BTreeMap<String, serde_json::Value>;

/// Invocations recorded for a single source file, keyed by test case name.
pub type FileTestInfo = IndexMap<String, Vec<InvocationSummary>>;

/// The session export document.
///
/// Produced once per session by the run metadata store. Files and test cases are listed in the
/// order in which they were first seen; invocations within a test case are ordered by index.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunInfoSummary {
    /// The number of call phases that passed.
    pub total_passed: usize,

    /// The number of call phases that failed.
    pub total_failed: usize,

    /// The number of call phases that were skipped.
    pub total_skipped: usize,

    /// Per-file, per-test-case invocation records.
    pub testinfo: IndexMap<String, FileTestInfo>,
}

impl RunInfoSummary {
    /// Builds a summary from per-file records, computing the totals from the call phases.
    pub fn new(testinfo: IndexMap<String, FileTestInfo>) -> Self {
        let mut summary = Self {
            total_passed: 0,
            total_failed: 0,
            total_skipped: 0,
            testinfo,
        };
        summary.recompute_totals();
        summary
    }

    /// Parses a summary from a JSON string.
    pub fn parse_json(json: &str) -> Result<Self, SummaryReadError> {
        serde_json::from_str(json).map_err(|error| SummaryReadError::Json { path: None, error })
    }

    /// Reads and parses a summary from a file on disk.
    pub fn read_from(path: &Utf8Path) -> Result<Self, SummaryReadError> {
        let json = std::fs::read_to_string(path).map_err(|error| SummaryReadError::Read {
            path: path.to_owned(),
            error,
        })?;
        serde_json::from_str(&json).map_err(|error| SummaryReadError::Json {
            path: Some(path.to_owned()),
            error,
        })
    }

    /// Recomputes `total_passed`, `total_failed` and `total_skipped` from the call phases.
    pub fn recompute_totals(&mut self) {
        let (mut passed, mut failed, mut skipped) = (0, 0, 0);
        for (_, _, invocation) in self.invocations() {
            match invocation.call.as_ref().map(|call| call.status) {
                Some(PhaseStatus::Passed) => passed += 1,
                Some(PhaseStatus::Failed) => failed += 1,
                Some(PhaseStatus::Skipped) => skipped += 1,
                Some(PhaseStatus::Error | PhaseStatus::Unknown) | None => {}
            }
        }
        self.total_passed = passed;
        self.total_failed = failed;
        self.total_skipped = skipped;
    }

    /// Iterates over every invocation as `(filename, testcase, invocation)`.
    pub fn invocations(&self) -> impl Iterator<Item = (&str, &str, &InvocationSummary)> + '_ {
        self.testinfo.iter().flat_map(|(filename, testcases)| {
            testcases.iter().flat_map(move |(testcase, invocations)| {
                invocations
                    .iter()
                    .map(move |invocation| (filename.as_str(), testcase.as_str(), invocation))
            })
        })
    }

    /// Returns the number of invocations in the document.
    pub fn invocation_count(&self) -> usize {
        self.invocations().count()
    }
}

/// A single invocation of a test case.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InvocationSummary {
    /// The invocation index within its `(filename, testcase)` bucket.
    pub index: usize,

    /// The setup phase, if it occurred.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup: Option<PhaseSummary>,

    /// The call phase, if it occurred.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call: Option<PhaseSummary>,

    /// The teardown phase, if it occurred.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teardown: Option<PhaseSummary>,
}

impl InvocationSummary {
    /// Returns the phase summary for the given phase.
    pub fn phase(&self, phase: Phase) -> Option<&PhaseSummary> {
        match phase {
            Phase::Setup => self.setup.as_ref(),
            Phase::Call => self.call.as_ref(),
            Phase::Teardown => self.teardown.as_ref(),
        }
    }

    /// Returns the overall outcome of this invocation.
    ///
    /// A skipped setup makes the invocation skipped, and a failing setup makes it an error.
    /// Otherwise the call status is used, except that a failing teardown turns a pass into an
    /// error.
    pub fn outcome(&self) -> PhaseStatus {
        let status_of = |phase: Option<&PhaseSummary>| phase.map_or(PhaseStatus::Unknown, |p| p.status);

        match status_of(self.setup.as_ref()) {
            PhaseStatus::Skipped => return PhaseStatus::Skipped,
            PhaseStatus::Failed | PhaseStatus::Error => return PhaseStatus::Error,
            PhaseStatus::Passed | PhaseStatus::Unknown => {}
        }

        let call = status_of(self.call.as_ref());
        match (call, status_of(self.teardown.as_ref())) {
            (PhaseStatus::Passed, PhaseStatus::Failed | PhaseStatus::Error) => PhaseStatus::Error,
            _ => call,
        }
    }

    /// Returns the sum of the durations of all recorded phases.
    pub fn total_duration(&self) -> Duration {
        [&self.setup, &self.call, &self.teardown]
            .into_iter()
            .flatten()
            .filter_map(|phase| phase.duration)
            .filter_map(|secs| Duration::try_from_secs_f64(secs).ok())
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

/// A single phase of an invocation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseSummary {
    /// Parametrization values (call phase only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<TestInputs>,

    /// Accumulated log text. Each entry is terminated by a newline.
    #[serde(default)]
    pub log: String,

    /// The final status of the phase.
    #[serde(default)]
    pub status: PhaseStatus,

    /// When the phase started.
    #[serde(default)]
    pub start: Option<DateTime<FixedOffset>>,

    /// When the phase stopped.
    #[serde(default)]
    pub stop: Option<DateTime<FixedOffset>>,

    /// How long the phase took, in seconds.
    #[serde(default)]
    pub duration: Option<f64>,
}

/// One of the three stages of a test invocation.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Fixture setup.
    Setup,

    /// The test body.
    Call,

    /// Fixture teardown.
    Teardown,
}

impl Phase {
    /// Returns the lowercase name of this phase.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Call => "call",
            Self::Teardown => "teardown",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome status of a phase.
#[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseStatus {
    /// The phase completed without an exception.
    Passed,

    /// The phase raised an assertion or explicit failure.
    Failed,

    /// The phase was skipped.
    Skipped,

    /// The phase raised some other exception.
    Error,

    /// No status was recorded.
    #[default]
    Unknown,
}

impl PhaseStatus {
    /// Returns the single-character marker used in finalized log file names.
    pub fn marker(self) -> char {
        match self {
            Self::Passed => 'P',
            Self::Failed => 'F',
            Self::Error => 'E',
            Self::Skipped => 'S',
            Self::Unknown => 'U',
        }
    }

    /// Returns the lowercase name of this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }

    /// Returns true if this status is anything other than [`Unknown`](Self::Unknown).
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Returns true if this status counts against the run.
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::Error)
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
