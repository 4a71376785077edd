// Copyright (c) The phaselog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The run metadata store.
//!
//! The store is the session-scoped record of every invocation's phases: timing, status, captured
//! inputs and accumulated log text. It's the source for the session export document, the JUnit
//! report and the summary table.

use crate::{
    errors::{DuplicateInvocationError, ExportError},
    identity::TestInvocationKey,
    reporter::junit,
    time::PhaseTiming,
};
use camino::Utf8Path;
use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use phaselog_metadata::{
    FileTestInfo, InvocationSummary, Phase, PhaseStatus, PhaseSummary, RunInfoSummary, TestInputs,
};
use std::io::Write;
use tracing::{debug, warn};

/// Accumulated state for one phase of an invocation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PhaseRecord {
    start: Option<DateTime<FixedOffset>>,
    stop: Option<DateTime<FixedOffset>>,
    duration: Option<f64>,
    status: PhaseStatus,
    log: String,
    inputs: Option<TestInputs>,
    recorded: bool,
}

impl PhaseRecord {
    /// Returns the status of this phase.
    pub fn status(&self) -> PhaseStatus {
        self.status
    }

    /// Returns the log text accumulated for this phase.
    pub fn log(&self) -> &str {
        &self.log
    }

    /// Returns the parametrization values captured for this phase.
    pub fn inputs(&self) -> Option<&TestInputs> {
        self.inputs.as_ref()
    }

    /// Returns the timing of this phase, if a result has been recorded.
    pub fn timing(&self) -> Option<PhaseTiming> {
        Some(PhaseTiming {
            start: self.start?,
            stop: self.stop?,
            duration: self.duration?,
        })
    }

    /// Returns true if a terminal result has been recorded for this phase.
    pub fn is_recorded(&self) -> bool {
        self.recorded
    }

    fn to_summary(&self) -> PhaseSummary {
        PhaseSummary {
            inputs: self.inputs.clone(),
            log: self.log.clone(),
            status: self.status,
            start: self.start,
            stop: self.stop,
            duration: self.duration,
        }
    }
}

/// The record of a single invocation of a test case.
#[derive(Clone, Debug, PartialEq)]
pub struct TestInvocationRecord {
    index: usize,
    setup: Option<PhaseRecord>,
    call: Option<PhaseRecord>,
    teardown: Option<PhaseRecord>,
}

impl TestInvocationRecord {
    fn new(index: usize) -> Self {
        Self {
            index,
            setup: None,
            call: None,
            teardown: None,
        }
    }

    /// Returns the invocation index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the record for `phase`, if it has been created.
    pub fn phase(&self, phase: Phase) -> Option<&PhaseRecord> {
        match phase {
            Phase::Setup => self.setup.as_ref(),
            Phase::Call => self.call.as_ref(),
            Phase::Teardown => self.teardown.as_ref(),
        }
    }

    /// Returns the record for `phase`, creating it if necessary.
    fn phase_mut(&mut self, phase: Phase) -> &mut PhaseRecord {
        let slot = match phase {
            Phase::Setup => &mut self.setup,
            Phase::Call => &mut self.call,
            Phase::Teardown => &mut self.teardown,
        };
        slot.get_or_insert_with(PhaseRecord::default)
    }

    fn to_summary(&self) -> InvocationSummary {
        InvocationSummary {
            index: self.index,
            setup: self.setup.as_ref().map(PhaseRecord::to_summary),
            call: self.call.as_ref().map(PhaseRecord::to_summary),
            teardown: self.teardown.as_ref().map(PhaseRecord::to_summary),
        }
    }
}

/// The result of [`RunMetadataStore::record_phase_result`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RecordOutcome {
    /// The result was recorded.
    Recorded,

    /// A result had already been recorded for this phase; nothing changed.
    AlreadyRecorded,

    /// The invocation isn't known to the store; nothing changed.
    UnknownInvocation,
}

/// Session-scoped record of all invocations, keyed by filename and then test case.
///
/// Files and test cases keep the order in which they were first seen.
#[derive(Clone, Debug, Default)]
pub struct RunMetadataStore {
    testinfo: IndexMap<String, IndexMap<String, Vec<TestInvocationRecord>>>,
}

impl RunMetadataStore {
    /// Creates a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index the next invocation of `(filename, testcase)` will get.
    pub fn next_index(&self, filename: &str, testcase: &str) -> usize {
        self.testinfo
            .get(filename)
            .and_then(|testcases| testcases.get(testcase))
            .map_or(0, Vec::len)
    }

    /// Appends an empty record for a new invocation.
    ///
    /// The key's index must be exactly [`next_index`](Self::next_index) for its pair.
    pub fn begin_invocation(&mut self, key: &TestInvocationKey) -> Result<(), DuplicateInvocationError> {
        let records = self
            .testinfo
            .entry(key.filename.clone())
            .or_default()
            .entry(key.testcase.clone())
            .or_default();

        if key.index != records.len() {
            return Err(DuplicateInvocationError::new(key.clone(), records.len()));
        }

        debug!(invocation = %key, "beginning invocation");
        records.push(TestInvocationRecord::new(key.index));
        Ok(())
    }

    /// Returns the record for `key`, if the invocation has begun.
    pub fn get(&self, key: &TestInvocationKey) -> Option<&TestInvocationRecord> {
        self.testinfo
            .get(&key.filename)?
            .get(&key.testcase)?
            .get(key.index)
    }

    fn get_mut(&mut self, key: &TestInvocationKey) -> Option<&mut TestInvocationRecord> {
        self.testinfo
            .get_mut(&key.filename)?
            .get_mut(&key.testcase)?
            .get_mut(key.index)
    }

    /// Returns true if the record for `(key, phase)` has been created.
    pub fn has_phase(&self, key: &TestInvocationKey, phase: Phase) -> bool {
        self.get(key).and_then(|record| record.phase(phase)).is_some()
    }

    /// Sets the status and timing of a phase. Results are recorded at most once per phase.
    pub fn record_phase_result(
        &mut self,
        key: &TestInvocationKey,
        phase: Phase,
        status: PhaseStatus,
        timing: PhaseTiming,
    ) -> RecordOutcome {
        let Some(record) = self.get_mut(key) else {
            warn!(invocation = %key, %phase, "result recorded for unknown invocation");
            return RecordOutcome::UnknownInvocation;
        };

        let phase_record = record.phase_mut(phase);
        if phase_record.recorded {
            warn!(
                invocation = %key,
                %phase,
                existing = %phase_record.status,
                ignored = %status,
                "phase result already recorded",
            );
            return RecordOutcome::AlreadyRecorded;
        }

        phase_record.status = status;
        phase_record.start = Some(timing.start);
        phase_record.stop = Some(timing.stop);
        phase_record.duration = Some(timing.duration);
        phase_record.recorded = true;
        RecordOutcome::Recorded
    }

    /// Appends text to a phase's log, adding a trailing newline if missing.
    pub fn append_log(&mut self, key: &TestInvocationKey, phase: Phase, text: &str) {
        let Some(record) = self.get_mut(key) else {
            warn!(invocation = %key, %phase, "log appended for unknown invocation");
            return;
        };

        let log = &mut record.phase_mut(phase).log;
        log.push_str(text);
        if !text.ends_with('\n') {
            log.push('\n');
        }
    }

    /// Stores parametrization values on the call phase.
    pub fn set_inputs(&mut self, key: &TestInvocationKey, inputs: TestInputs) {
        match self.get_mut(key) {
            Some(record) => record.phase_mut(Phase::Call).inputs = Some(inputs),
            None => warn!(invocation = %key, "inputs set for unknown invocation"),
        }
    }

    /// Returns the number of invocations in the store.
    pub fn invocation_count(&self) -> usize {
        self.testinfo
            .values()
            .flat_map(|testcases| testcases.values())
            .map(Vec::len)
            .sum()
    }

    /// Produces the session export document.
    pub fn snapshot(&self) -> RunInfoSummary {
        let testinfo = self
            .testinfo
            .iter()
            .map(|(filename, testcases)| {
                let testcases: FileTestInfo = testcases
                    .iter()
                    .map(|(testcase, records)| {
                        let invocations =
                            records.iter().map(TestInvocationRecord::to_summary).collect();
                        (testcase.clone(), invocations)
                    })
                    .collect();
                (filename.clone(), testcases)
            })
            .collect();
        RunInfoSummary::new(testinfo)
    }

    /// Writes the session export document to `path` as pretty-printed JSON.
    pub fn export(&self, path: &Utf8Path) -> Result<(), ExportError> {
        let json = serde_json::to_string_pretty(&self.snapshot()).map_err(|error| {
            ExportError::Serialize {
                path: path.to_owned(),
                error,
            }
        })?;
        write_atomic(path, json.as_bytes())
    }

    /// Writes a JUnit XML report of the session to `path`.
    pub fn export_junit(&self, path: &Utf8Path, report_name: &str) -> Result<(), ExportError> {
        let report = junit::build_report(report_name, &self.snapshot());
        let mut xml = Vec::new();
        report.serialize(&mut xml).map_err(|error| ExportError::Junit {
            path: path.to_owned(),
            error,
        })?;
        write_atomic(path, &xml)
    }
}

fn write_atomic(path: &Utf8Path, contents: &[u8]) -> Result<(), ExportError> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|error| ExportError::CreateDir {
            dir: dir.to_owned(),
            error,
        })?;
    }

    atomicwrites::AtomicFile::new(path, atomicwrites::AllowOverwrite)
        .write(|file| file.write_all(contents))
        .map_err(|error| ExportError::Write {
            path: path.to_owned(),
            error,
        })?;

    debug!(%path, "wrote export");
    Ok(())
}
