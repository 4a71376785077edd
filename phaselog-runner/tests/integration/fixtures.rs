// Copyright (c) The phaselog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8Path;
use camino_tempfile::Utf8TempDir;
use phaselog_runner::{
    identity::RunnerContext,
    lifecycle::{ExceptionKind, PhaseOutcome},
    router::CommandLineOutput,
    session::{SessionContext, SessionSettings},
};

pub(crate) struct TestSession {
    // Held so the log directory outlives the session.
    pub(crate) dir: Utf8TempDir,
    pub(crate) session: SessionContext,
}

impl TestSession {
    pub(crate) fn new() -> Self {
        Self::with_settings(|_| {})
    }

    pub(crate) fn with_settings(f: impl FnOnce(&mut SessionSettings)) -> Self {
        let dir = camino_tempfile::tempdir().expect("tempdir created");
        let mut settings = SessionSettings::new(dir.path().join("logs"));
        f(&mut settings);
        let session = SessionContext::new(settings, CommandLineOutput::Buffer(Vec::new()));
        Self { dir, session }
    }

    pub(crate) fn log_dir(&self) -> &Utf8Path {
        self.session.router().log_dir()
    }

    /// Returns per-phase log file names, sorted, excluding the global log.
    pub(crate) fn phase_log_files(&self) -> Vec<String> {
        let Ok(entries) = self.log_dir().read_dir_utf8() else {
            return Vec::new();
        };
        let mut names: Vec<_> = entries
            .map(|entry| entry.expect("dir entry readable").file_name().to_owned())
            .filter(|name| !name.ends_with("_all.log"))
            .collect();
        names.sort();
        names
    }

    pub(crate) fn cmd_text(&self) -> String {
        match self.session.router().cmd_output() {
            CommandLineOutput::Buffer(buf) => String::from_utf8(buf.clone()).expect("valid UTF-8"),
            other => panic!("unexpected command-line output: {other:?}"),
        }
    }

    /// Runs one full invocation. The call phase is skipped if `call` is `None`.
    pub(crate) fn run_test(
        &mut self,
        context: &RunnerContext,
        setup: ExceptionKind,
        call: Option<ExceptionKind>,
        body: impl FnOnce(&mut SessionContext),
    ) {
        let session = &mut self.session;
        session.setup_started(context);
        session.setup_finished(PhaseOutcome::new(setup));
        if let Some(call) = call {
            session.call_started();
            body(session);
            session.call_finished(PhaseOutcome::new(call));
        }
        session.teardown_started();
        session.teardown_finished(PhaseOutcome::passed());
    }
}

/// Returns the one name in `names` with the given marker and suffix.
pub(crate) fn find_file<'a>(names: &'a [String], marker: char, suffix: &str) -> &'a str {
    let matching: Vec<_> = names
        .iter()
        .filter(|name| name.contains(&format!("_{marker}_")) && name.ends_with(suffix))
        .collect();
    assert_eq!(
        matching.len(),
        1,
        "expected one file marked {marker} ending in {suffix}, found: {names:?}"
    );
    matching[0]
}
