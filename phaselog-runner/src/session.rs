// Copyright (c) The phaselog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The session context: one explicitly constructed owner for everything a session needs.
//!
//! A [`SessionContext`] owns the run metadata store, the log router and the phase lifecycle
//! controller. Runner hooks and log calls take `&mut self`, while exports take `&self`, so an
//! export always observes a consistent snapshot.

use crate::{
    errors::{ExportError, ReplayError, SessionFault},
    events::RunnerEvent,
    identity::RunnerContext,
    lifecycle::{FakeSetupScope, InvocationState, PhaseController, PhaseOutcome},
    reporter::SessionAggregator,
    router::{CommandLineOutput, LogRouter, RouterSettings, Severity},
    store::RunMetadataStore,
};
use camino::{Utf8Path, Utf8PathBuf};
use phaselog_metadata::PhaseStatus;
use std::ops::{Deref, DerefMut};
use tracing::debug;

/// JUnit output settings.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JunitSettings {
    /// Where the report is written.
    pub path: Utf8PathBuf,

    /// The name of the report.
    pub report_name: String,
}

/// Settings for a [`SessionContext`].
#[derive(Clone, Debug)]
pub struct SessionSettings {
    /// Log router settings.
    pub router: RouterSettings,

    /// Where the session export document is written when the session finishes.
    pub export_path: Option<Utf8PathBuf>,

    /// Where the JUnit report is written when the session finishes.
    pub junit: Option<JunitSettings>,
}

impl SessionSettings {
    /// Creates settings that write logs to `log_dir` and export nothing.
    pub fn new(log_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            router: RouterSettings::new(log_dir),
            export_path: None,
            junit: None,
        }
    }
}

/// Files written by [`SessionContext::finish`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SessionOutputs {
    /// The session export document, if written.
    pub export: Option<Utf8PathBuf>,

    /// The JUnit report, if written.
    pub junit: Option<Utf8PathBuf>,
}

/// Owns the store, router and controller for a single test session.
#[derive(Debug)]
pub struct SessionContext {
    store: RunMetadataStore,
    router: LogRouter,
    controller: PhaseController,
    export_path: Option<Utf8PathBuf>,
    junit: Option<JunitSettings>,
}

impl SessionContext {
    /// Creates a new session, opening the global log if enabled.
    pub fn new(settings: SessionSettings, output: CommandLineOutput) -> Self {
        debug!(log_dir = %settings.router.log_dir, "starting session");
        Self {
            store: RunMetadataStore::new(),
            router: LogRouter::new(settings.router, output),
            controller: PhaseController::new(),
            export_path: settings.export_path,
            junit: settings.junit,
        }
    }

    // ---
    // Runner hooks
    // ---

    /// Called when a test's setup starts.
    pub fn setup_started(&mut self, context: &RunnerContext) {
        self.controller
            .setup_started(context, &mut self.router, &mut self.store);
    }

    /// Called when a test's setup ends.
    pub fn setup_finished(&mut self, outcome: PhaseOutcome) {
        self.controller
            .setup_finished(outcome, &mut self.router, &mut self.store);
    }

    /// Called when a test's body starts.
    pub fn call_started(&mut self) {
        self.controller.call_started(&mut self.router, &mut self.store);
    }

    /// Called when a test's body ends.
    pub fn call_finished(&mut self, outcome: PhaseOutcome) {
        self.controller
            .call_finished(outcome, &mut self.router, &mut self.store);
    }

    /// Called when a test's teardown starts.
    pub fn teardown_started(&mut self) {
        self.controller.teardown_started(&mut self.router);
    }

    /// Called when a test's teardown ends. Finalizes the invocation.
    pub fn teardown_finished(&mut self, outcome: PhaseOutcome) {
        self.controller
            .teardown_finished(outcome, &mut self.router, &mut self.store);
    }

    /// Opens a fake setup scope on the current invocation.
    ///
    /// While the returned guard is alive, log calls made through it go to a new setup destination
    /// and the invocation's call destination is masked. Dropping the guard closes the setup
    /// destination and unmasks the call destination, on every exit path.
    pub fn enter_fake_setup(&mut self) -> FakeSetupGuard<'_> {
        let scope = self.controller.enter_fake_setup(&mut self.router);
        FakeSetupGuard {
            session: self,
            scope,
            status: PhaseStatus::Unknown,
        }
    }

    // ---
    // Log calls
    // ---

    /// Logs a message at the given severity.
    pub fn log(&mut self, severity: Severity, message: &str) {
        self.router.log(&mut self.store, severity, message);
    }

    /// Logs a debug message.
    pub fn debug(&mut self, message: &str) {
        self.log(Severity::Debug, message);
    }

    /// Logs an informational message.
    pub fn info(&mut self, message: &str) {
        self.log(Severity::Info, message);
    }

    /// Logs the next numbered step.
    pub fn step(&mut self, message: &str) {
        self.log(Severity::Step, message);
    }

    /// Logs the next numbered sub-step of the current step.
    pub fn substep(&mut self, message: &str) {
        self.log(Severity::Substep, message);
    }

    /// Logs a passed check.
    pub fn pass(&mut self, message: &str) {
        self.log(Severity::Pass, message);
    }

    /// Logs a warning.
    pub fn warning(&mut self, message: &str) {
        self.log(Severity::Warning, message);
    }

    /// Logs a failed check.
    pub fn fail(&mut self, message: &str) {
        self.log(Severity::Fail, message);
    }

    /// Logs an error.
    pub fn error(&mut self, message: &str) {
        self.log(Severity::Error, message);
    }

    /// Logs a critical error.
    pub fn critical(&mut self, message: &str) {
        self.log(Severity::Critical, message);
    }

    /// Logs a register write and its read-back. Returns true if the values matched.
    pub fn rw(&mut self, name: &str, write: i64, read: i64) -> bool {
        self.router.rw(&mut self.store, name, write, read)
    }

    /// Logs free text alongside register entries.
    pub fn rw_message(&mut self, text: &str) {
        self.router.rw_message(&mut self.store, text);
    }

    // ---
    // Readouts
    // ---

    /// Returns the run metadata store.
    pub fn store(&self) -> &RunMetadataStore {
        &self.store
    }

    /// Returns the log router.
    pub fn router(&self) -> &LogRouter {
        &self.router
    }

    /// Returns the lifecycle state of the current invocation.
    pub fn state(&self) -> InvocationState {
        self.controller.state()
    }

    /// Returns the faults recorded so far. Faults never stop a session.
    pub fn faults(&self) -> &[SessionFault] {
        self.router.faults()
    }

    /// Computes per-test tallies from the store.
    pub fn aggregate(&self) -> SessionAggregator {
        SessionAggregator::from_summary(&self.store.snapshot())
    }

    /// Writes the session export document to `path`.
    pub fn export(&self, path: &Utf8Path) -> Result<(), ExportError> {
        self.store.export(path)
    }

    /// Writes a JUnit report to `path`.
    pub fn export_junit(&self, path: &Utf8Path, report_name: &str) -> Result<(), ExportError> {
        self.store.export_junit(path, report_name)
    }

    /// Finalizes any invocations still in progress and writes the configured exports.
    pub fn finish(&mut self) -> Result<SessionOutputs, ExportError> {
        self.controller.finish(&mut self.router, &mut self.store);

        let mut outputs = SessionOutputs::default();
        if let Some(path) = &self.export_path {
            self.store.export(path)?;
            outputs.export = Some(path.clone());
        }
        if let Some(junit) = &self.junit {
            self.store.export_junit(&junit.path, &junit.report_name)?;
            outputs.junit = Some(junit.path.clone());
        }
        Ok(outputs)
    }

    // ---
    // Replay
    // ---

    /// Drives the session from a sequence of runner events.
    ///
    /// Fake setup scopes in the stream are checked for balance before any event is applied.
    pub fn replay(&mut self, events: &[RunnerEvent]) -> Result<(), ReplayError> {
        check_fake_setup_nesting(events)?;
        replay_events(self, events);
        Ok(())
    }

    fn apply(&mut self, event: &RunnerEvent) {
        match event {
            RunnerEvent::SetupStarted {
                path,
                testcase,
                params,
            } => self.setup_started(&RunnerContext {
                path: path.clone(),
                testcase: testcase.clone(),
                params: params.clone(),
            }),
            RunnerEvent::SetupFinished(outcome) => self.setup_finished(outcome.to_outcome()),
            RunnerEvent::CallStarted => self.call_started(),
            RunnerEvent::CallFinished(outcome) => self.call_finished(outcome.to_outcome()),
            RunnerEvent::TeardownStarted => self.teardown_started(),
            RunnerEvent::TeardownFinished(outcome) => self.teardown_finished(outcome.to_outcome()),
            RunnerEvent::Log { level, message } => self.log(*level, message),
            RunnerEvent::Register { name, write, read } => {
                self.rw(name, *write, *read);
            }
            RunnerEvent::RwMessage { message } => self.rw_message(message),
            RunnerEvent::FakeSetupStarted | RunnerEvent::FakeSetupFinished { .. } => {
                unreachable!("fake setup events are handled by replay_events")
            }
        }
    }
}

fn check_fake_setup_nesting(events: &[RunnerEvent]) -> Result<(), ReplayError> {
    let mut open = Vec::new();
    for (position, event) in events.iter().enumerate() {
        match event {
            RunnerEvent::FakeSetupStarted => open.push(position),
            RunnerEvent::FakeSetupFinished { .. } => {
                if open.pop().is_none() {
                    return Err(ReplayError::UnmatchedFakeSetupFinished { position });
                }
            }
            _ => {}
        }
    }
    match open.first() {
        Some(&position) => Err(ReplayError::UnterminatedFakeSetup { position }),
        None => Ok(()),
    }
}

// Applies events until the end of the stream or the end of the enclosing fake setup scope.
// Returns the number of events consumed, including the scope's closing event.
fn replay_events(session: &mut SessionContext, events: &[RunnerEvent]) -> usize {
    let mut pos = 0;
    while let Some(event) = events.get(pos) {
        match event {
            RunnerEvent::FakeSetupStarted => {
                let mut guard = session.enter_fake_setup();
                let consumed = replay_events(&mut guard, &events[pos + 1..]);
                pos += 1 + consumed;
                if let Some(RunnerEvent::FakeSetupFinished { exception }) = events.get(pos - 1) {
                    guard.finish(exception.status());
                }
            }
            RunnerEvent::FakeSetupFinished { .. } => return pos + 1,
            other => {
                session.apply(other);
                pos += 1;
            }
        }
    }
    pos
}

/// A fake setup scope opened by [`SessionContext::enter_fake_setup`].
///
/// Dereferences to the session so log calls can be made through it. Dropping the guard releases
/// the scope with [`PhaseStatus::Unknown`] unless [`finish`](Self::finish) set a status.
#[derive(Debug)]
pub struct FakeSetupGuard<'a> {
    session: &'a mut SessionContext,
    scope: Option<FakeSetupScope>,
    status: PhaseStatus,
}

impl FakeSetupGuard<'_> {
    /// Releases the scope, renaming the fake setup log for `status`.
    pub fn finish(mut self, status: PhaseStatus) {
        self.status = status;
    }
}

impl Deref for FakeSetupGuard<'_> {
    type Target = SessionContext;

    fn deref(&self) -> &SessionContext {
        self.session
    }
}

impl DerefMut for FakeSetupGuard<'_> {
    fn deref_mut(&mut self) -> &mut SessionContext {
        self.session
    }
}

impl Drop for FakeSetupGuard<'_> {
    fn drop(&mut self) {
        if let Some(scope) = self.scope.take() {
            let session = &mut *self.session;
            session
                .controller
                .exit_fake_setup(scope, self.status, &mut session.router);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::ExceptionKind;
    use camino_tempfile::tempdir;
    use phaselog_metadata::Phase;
    use pretty_assertions::assert_eq;

    fn session(dir: &Utf8Path) -> SessionContext {
        let mut settings = SessionSettings::new(dir);
        settings.router.global_log = false;
        SessionContext::new(settings, CommandLineOutput::Buffer(Vec::new()))
    }

    fn log_files(dir: &Utf8Path) -> Vec<String> {
        let mut names: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn fake_setup_masks_call() {
        let dir = tempdir().unwrap();
        let mut session = session(dir.path());
        let key_context = RunnerContext::new("test_mod.py", "test_foo");

        session.setup_started(&key_context);
        session.setup_finished(PhaseOutcome::passed());
        session.call_started();
        session.info("before");
        {
            let mut guard = session.enter_fake_setup();
            assert_eq!(guard.router().destinations().len(), 2);
            guard.info("in fake setup");
            guard.finish(PhaseStatus::Passed);
        }
        session.info("after");
        session.call_finished(PhaseOutcome::passed());
        session.teardown_started();
        session.teardown_finished(PhaseOutcome::passed());

        let key = crate::identity::TestInvocationKey::new("test_mod.py", "test_foo", 0);
        let record = session.store().get(&key).unwrap();
        let call = record.phase(Phase::Call).unwrap().log();
        assert!(!call.contains("in fake setup"), "call log: {call}");
        assert_eq!(call.lines().count(), 2);
        assert!(record.phase(Phase::Setup).unwrap().log().contains("in fake setup"));

        let files = log_files(dir.path());
        assert_eq!(files.len(), 3, "files: {files:?}");
        assert_eq!(
            files.iter().filter(|name| name.contains("_P_")).count(),
            3,
            "files: {files:?}"
        );
    }

    #[test]
    fn fake_setup_dropped_without_finish_is_unknown() {
        let dir = tempdir().unwrap();
        let mut session = session(dir.path());

        session.setup_started(&RunnerContext::new("test_mod.py", "test_foo"));
        session.setup_finished(PhaseOutcome::passed());
        session.call_started();
        drop(session.enter_fake_setup());
        assert_eq!(session.router().destinations().len(), 1);
        assert!(!session.router().destinations()[0].is_masked());

        let files = log_files(dir.path());
        assert!(
            files.iter().any(|name| name.contains("_U_") && name.contains("_setup_0")),
            "files: {files:?}"
        );
    }

    #[test]
    fn fake_setup_without_invocation_is_inert() {
        let dir = tempdir().unwrap();
        let mut session = session(dir.path());
        {
            let mut guard = session.enter_fake_setup();
            guard.info("outside any test");
        }
        assert!(log_files(dir.path()).is_empty());
        assert_eq!(session.state(), InvocationState::Idle);
    }

    #[test]
    fn replay_rejects_unbalanced_scopes() {
        let dir = tempdir().unwrap();
        let mut session = session(dir.path());

        let error = session
            .replay(&[RunnerEvent::FakeSetupFinished {
                exception: ExceptionKind::None,
            }])
            .unwrap_err();
        assert_eq!(error, ReplayError::UnmatchedFakeSetupFinished { position: 0 });

        let error = session
            .replay(&[
                RunnerEvent::FakeSetupStarted,
                RunnerEvent::FakeSetupStarted,
                RunnerEvent::FakeSetupFinished {
                    exception: ExceptionKind::None,
                },
            ])
            .unwrap_err();
        assert_eq!(error, ReplayError::UnterminatedFakeSetup { position: 0 });
    }

    #[test]
    fn out_of_order_hooks_are_still_recorded() {
        let dir = tempdir().unwrap();
        let mut session = session(dir.path());

        // No invocation yet, so this is dropped.
        session.call_finished(PhaseOutcome::new(ExceptionKind::Fail));
        assert_eq!(session.store().invocation_count(), 0);

        session.setup_started(&RunnerContext::new("test_mod.py", "test_foo"));
        session.setup_finished(PhaseOutcome::passed());
        session.call_finished(PhaseOutcome::new(ExceptionKind::Fail));
        assert_eq!(session.state(), InvocationState::CallFinished);

        let key = crate::identity::TestInvocationKey::new("test_mod.py", "test_foo", 0);
        let call = session
            .store()
            .get(&key)
            .and_then(|record| record.phase(Phase::Call))
            .expect("call record exists");
        assert_eq!(call.status(), PhaseStatus::Failed);
        assert!(session.faults().is_empty());
    }

    #[test]
    fn finish_closes_open_destinations() {
        let dir = tempdir().unwrap();
        let mut session = session(dir.path());

        session.setup_started(&RunnerContext::new("test_mod.py", "test_foo"));
        session.setup_finished(PhaseOutcome::passed());
        session.call_started();
        session.info("interrupted");

        assert_eq!(session.finish().unwrap(), SessionOutputs::default());
        assert!(session.router().destinations().is_empty());

        let files = log_files(dir.path());
        assert!(files.iter().all(|name| !name.contains("_X_")), "files: {files:?}");
        assert!(files.iter().any(|name| name.contains("_U_")), "files: {files:?}");
    }
}
