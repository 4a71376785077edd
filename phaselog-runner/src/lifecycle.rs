// Copyright (c) The phaselog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The phase lifecycle controller.
//!
//! The controller tracks the current invocation through its phases and drives the router's
//! destinations accordingly: opening, masking, unmasking, closing and renaming them, and recording
//! phase results in the store.
//!
//! ```text
//! Idle -> SetupOpen -> SetupFinished -> CallOpen -> CallFinished -> Teardown -> Finalized
//!            \-> SetupMaskingCall -/
//! ```
//!
//! A setup that starts while another invocation's call is open masks that call destination and
//! suspends the invocation. The suspended invocation becomes current again once the new one is
//! finalized.

use crate::{
    errors::SessionFault,
    identity::{self, RunnerContext, TestInvocationKey},
    router::{CmdPrefix, DestinationKind, LogRouter},
    store::RunMetadataStore,
    time::{PhaseTiming, StopwatchStart, stopwatch},
};
use phaselog_metadata::{Phase, PhaseStatus, TestInputs};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// How a phase ended, as reported by the runner.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExceptionKind {
    /// The phase completed normally.
    #[default]
    None,

    /// The phase requested a skip.
    Skip,

    /// The phase raised an assertion or explicit failure.
    Fail,

    /// The phase raised any other exception.
    Other,
}

impl ExceptionKind {
    /// Returns the phase status for this exception kind.
    pub fn status(self) -> PhaseStatus {
        match self {
            Self::None => PhaseStatus::Passed,
            Self::Skip => PhaseStatus::Skipped,
            Self::Fail => PhaseStatus::Failed,
            Self::Other => PhaseStatus::Error,
        }
    }
}

/// The result of a phase, as reported by the runner.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PhaseOutcome {
    /// How the phase ended.
    pub exception: ExceptionKind,

    /// Explicit timing. If absent, the controller's own stopwatch is used.
    pub timing: Option<PhaseTiming>,
}

impl PhaseOutcome {
    /// A phase that completed normally.
    pub fn passed() -> Self {
        Self::new(ExceptionKind::None)
    }

    /// A phase that ended with the given exception kind.
    pub fn new(exception: ExceptionKind) -> Self {
        Self {
            exception,
            timing: None,
        }
    }

    /// Sets explicit timing.
    pub fn with_timing(mut self, timing: PhaseTiming) -> Self {
        self.timing = Some(timing);
        self
    }
}

/// The lifecycle state of an invocation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InvocationState {
    /// No invocation is in progress.
    Idle,

    /// Setup is running.
    SetupOpen,

    /// Setup is running and has masked a call destination.
    SetupMaskingCall,

    /// Setup has ended; the call hasn't started.
    SetupFinished,

    /// The call is running.
    CallOpen,

    /// The call has ended; teardown hasn't started.
    CallFinished,

    /// Teardown is running.
    Teardown,

    /// Teardown has ended.
    Finalized,
}

#[derive(Debug)]
struct ActiveInvocation {
    key: TestInvocationKey,
    state: InvocationState,
    inputs: TestInputs,
    stopwatch: Option<StopwatchStart>,
}

impl ActiveInvocation {
    fn test_prefix(&self) -> CmdPrefix {
        CmdPrefix::Test {
            filename: self.key.filename.clone(),
            testcase: self.key.testcase.clone(),
        }
    }

    fn setup_prefix(&self) -> CmdPrefix {
        CmdPrefix::Setup {
            filename: self.key.filename.clone(),
            testcase: self.key.testcase.clone(),
        }
    }

    fn timing(&mut self, outcome: &PhaseOutcome) -> PhaseTiming {
        outcome.timing.unwrap_or_else(|| {
            self.stopwatch
                .take()
                .unwrap_or_else(stopwatch)
                .snapshot()
                .to_timing()
        })
    }
}

/// Per-invocation state machine driven by the runner's lifecycle hooks.
#[derive(Debug, Default)]
pub struct PhaseController {
    current: Option<ActiveInvocation>,
    suspended: Vec<ActiveInvocation>,
}

/// State saved while a fake setup scope is open.
#[derive(Debug)]
pub(crate) struct FakeSetupScope {
    key: TestInvocationKey,
    masked_call: bool,
    prefix: CmdPrefix,
}

impl PhaseController {
    /// Creates a controller with no invocation in progress.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the state of the current invocation.
    pub fn state(&self) -> InvocationState {
        self.current
            .as_ref()
            .map_or(InvocationState::Idle, |current| current.state)
    }

    /// Returns the key of the current invocation.
    pub fn current_key(&self) -> Option<&TestInvocationKey> {
        self.current.as_ref().map(|current| &current.key)
    }

    pub(crate) fn setup_started(
        &mut self,
        context: &RunnerContext,
        router: &mut LogRouter,
        store: &mut RunMetadataStore,
    ) {
        let key = match identity::resolve(context, store) {
            Ok(key) => key,
            Err(error) => {
                self.abandon_current(router, store);
                router.report_fault(error.into());
                return;
            }
        };
        if let Err(error) = store.begin_invocation(&key) {
            self.abandon_current(router, store);
            router.report_fault(SessionFault::DuplicateInvocation(error));
            return;
        }

        let masking = match self.current.take() {
            Some(current) if current.state == InvocationState::CallOpen => {
                let masked = router.mask(&current.key, DestinationKind::Call);
                debug!(suspended = %current.key, invocation = %key, "suspending invocation");
                self.suspended.push(current);
                masked
            }
            Some(current) => {
                if current.state != InvocationState::Finalized {
                    warn!(
                        previous = %current.key,
                        state = ?current.state,
                        invocation = %key,
                        "setup started before the previous invocation finished",
                    );
                }
                Self::finalize(current, router, store);
                false
            }
            None => false,
        };

        let current = ActiveInvocation {
            key,
            state: if masking {
                InvocationState::SetupMaskingCall
            } else {
                InvocationState::SetupOpen
            },
            inputs: context.params.clone(),
            stopwatch: Some(stopwatch()),
        };
        debug!(invocation = %current.key, "setup started");

        router.reset_steps();
        router.set_prefix(current.setup_prefix());
        router.open_destination(&current.key, DestinationKind::Setup);
        self.current = Some(current);
    }

    pub(crate) fn setup_finished(
        &mut self,
        outcome: PhaseOutcome,
        router: &mut LogRouter,
        store: &mut RunMetadataStore,
    ) {
        let Some(current) = self.current_for("setup-finished") else {
            return;
        };
        if !matches!(
            current.state,
            InvocationState::SetupOpen | InvocationState::SetupMaskingCall
        ) {
            warn!(invocation = %current.key, state = ?current.state, "setup finished out of order");
        }

        let status = outcome.exception.status();
        let timing = current.timing(&outcome);
        store.record_phase_result(&current.key, Phase::Setup, status, timing);
        router.close_destination(&current.key, DestinationKind::Setup, status);
        router.set_prefix(current.test_prefix());

        let was_masking = current.state == InvocationState::SetupMaskingCall;
        current.state = InvocationState::SetupFinished;
        if was_masking {
            if let Some(suspended) = self.suspended.last() {
                router.unmask(&suspended.key, DestinationKind::Call);
            }
        }
    }

    pub(crate) fn call_started(&mut self, router: &mut LogRouter, store: &mut RunMetadataStore) {
        let Some(current) = self.current_for("call-started") else {
            return;
        };
        if current.state != InvocationState::SetupFinished {
            warn!(invocation = %current.key, state = ?current.state, "call started out of order");
        }

        store.set_inputs(&current.key, current.inputs.clone());
        if !router.has_destination(&current.key, DestinationKind::Call) {
            router.open_destination(&current.key, DestinationKind::Call);
        }
        router.set_prefix(current.test_prefix());
        current.state = InvocationState::CallOpen;
        current.stopwatch = Some(stopwatch());
    }

    pub(crate) fn call_finished(
        &mut self,
        outcome: PhaseOutcome,
        router: &mut LogRouter,
        store: &mut RunMetadataStore,
    ) {
        let Some(current) = self.current_for("call-finished") else {
            return;
        };
        if current.state != InvocationState::CallOpen {
            warn!(invocation = %current.key, state = ?current.state, "call finished out of order");
        }

        let status = outcome.exception.status();
        let timing = current.timing(&outcome);
        store.record_phase_result(&current.key, Phase::Call, status, timing);
        router.close_destination(&current.key, DestinationKind::Call, status);
        current.state = InvocationState::CallFinished;
    }

    pub(crate) fn teardown_started(&mut self, router: &mut LogRouter) {
        let Some(current) = self.current_for("teardown-started") else {
            return;
        };
        if !matches!(
            current.state,
            InvocationState::SetupFinished | InvocationState::CallFinished
        ) {
            warn!(invocation = %current.key, state = ?current.state, "teardown started out of order");
        }

        router.begin_teardown(&current.key);
        router.set_prefix(current.test_prefix());
        current.state = InvocationState::Teardown;
        current.stopwatch = Some(stopwatch());
    }

    pub(crate) fn teardown_finished(
        &mut self,
        outcome: PhaseOutcome,
        router: &mut LogRouter,
        store: &mut RunMetadataStore,
    ) {
        let Some(current) = self.current_for("teardown-finished") else {
            return;
        };
        if current.state != InvocationState::Teardown {
            warn!(invocation = %current.key, state = ?current.state, "teardown finished out of order");
        }

        let status = outcome.exception.status();
        let timing = current.timing(&outcome);
        store.record_phase_result(&current.key, Phase::Teardown, status, timing);

        if let Some(current) = self.current.take() {
            Self::finalize(current, router, store);
        }
        self.resume_suspended(router);
    }

    /// Opens a fake setup scope on the current invocation.
    ///
    /// Returns `None` if no invocation is in progress.
    pub(crate) fn enter_fake_setup(&mut self, router: &mut LogRouter) -> Option<FakeSetupScope> {
        let Some(current) = &self.current else {
            warn!("fake setup entered with no invocation in progress");
            return None;
        };

        let masked_call = router.mask(&current.key, DestinationKind::Call);
        let prefix = router.prefix().clone();
        router.set_prefix(current.setup_prefix());
        router.open_destination(&current.key, DestinationKind::Setup);
        debug!(invocation = %current.key, masked_call, "fake setup entered");

        Some(FakeSetupScope {
            key: current.key.clone(),
            masked_call,
            prefix,
        })
    }

    /// Closes a fake setup scope, renaming its file for `status` and unmasking the call.
    pub(crate) fn exit_fake_setup(
        &mut self,
        scope: FakeSetupScope,
        status: PhaseStatus,
        router: &mut LogRouter,
    ) {
        router.close_destination(&scope.key, DestinationKind::Setup, status);
        if scope.masked_call {
            router.unmask(&scope.key, DestinationKind::Call);
        }
        router.set_prefix(scope.prefix);
        debug!(invocation = %scope.key, %status, "fake setup exited");
    }

    /// Finalizes every invocation still in progress. Called at the end of a session.
    pub(crate) fn finish(&mut self, router: &mut LogRouter, store: &mut RunMetadataStore) {
        if let Some(current) = self.current.take() {
            if current.state != InvocationState::Finalized {
                warn!(invocation = %current.key, state = ?current.state, "session ended mid-invocation");
            }
            Self::finalize(current, router, store);
        }
        while let Some(suspended) = self.suspended.pop() {
            warn!(invocation = %suspended.key, state = ?suspended.state, "session ended mid-invocation");
            Self::finalize(suspended, router, store);
        }
        router.set_prefix(CmdPrefix::Outside);
    }

    fn current_for(&mut self, hook: &'static str) -> Option<&mut ActiveInvocation> {
        if self.current.is_none() {
            warn!(hook, "dropping hook: no invocation in progress");
        }
        self.current.as_mut()
    }

    // Used when a new setup fails to resolve. An open call stays current so its teardown still
    // finds it.
    fn abandon_current(&mut self, router: &mut LogRouter, store: &mut RunMetadataStore) {
        match self.current.take() {
            Some(current) if current.state == InvocationState::CallOpen => {
                self.current = Some(current);
            }
            Some(current) => {
                Self::finalize(current, router, store);
                self.resume_suspended(router);
            }
            None => router.set_prefix(CmdPrefix::Outside),
        }
    }

    fn resume_suspended(&mut self, router: &mut LogRouter) {
        self.current = self.suspended.pop();
        match &self.current {
            Some(current) => {
                debug!(invocation = %current.key, "resuming suspended invocation");
                router.unmask(&current.key, DestinationKind::Call);
                router.set_prefix(current.test_prefix());
            }
            None => router.set_prefix(CmdPrefix::Outside),
        }
    }

    fn finalize(
        current: ActiveInvocation,
        router: &mut LogRouter,
        store: &mut RunMetadataStore,
    ) {
        for kind in [DestinationKind::Setup, DestinationKind::Call] {
            while router.has_destination(&current.key, kind) {
                let status = store
                    .get(&current.key)
                    .and_then(|record| record.phase(kind.phase()))
                    .map_or(PhaseStatus::Unknown, |record| record.status());
                router.close_destination(&current.key, kind, status);
            }
        }
        router.end_teardown();
        debug!(invocation = %current.key, "invocation finalized");
    }
}
