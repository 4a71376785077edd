// Copyright (c) The phaselog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::{TestSession, find_file};
use phaselog_metadata::{Phase, PhaseStatus};
use phaselog_runner::{
    identity::{RunnerContext, TestInvocationKey},
    lifecycle::{ExceptionKind, InvocationState, PhaseOutcome},
};
use pretty_assertions::assert_eq;

#[test]
fn repeated_invocations_are_indexed_in_order() {
    let mut test = TestSession::new();
    let context = RunnerContext::new("tests/test_mod.py", "test_foo");
    for _ in 0..4 {
        test.run_test(&context, ExceptionKind::None, Some(ExceptionKind::None), |_| {});
    }

    let store = test.session.store();
    assert_eq!(store.invocation_count(), 4);
    assert_eq!(store.next_index("test_mod.py", "test_foo"), 4);
    for index in 0..4 {
        let record = store
            .get(&TestInvocationKey::new("test_mod.py", "test_foo", index))
            .unwrap_or_else(|| panic!("invocation {index} recorded"));
        assert_eq!(record.index(), index);
    }

    let files = test.phase_log_files();
    assert_eq!(files.len(), 8, "files: {files:?}");
    for index in 0..4 {
        find_file(&files, 'P', &format!("test_mod.py_test_foo_{index}.log"));
        find_file(&files, 'P', &format!("test_mod.py_test_foo_setup_{index}.log"));
    }
}

#[test]
fn passing_call_is_renamed_with_passed_marker() {
    let mut test = TestSession::new();
    test.run_test(
        &RunnerContext::new("test_mod.py", "test_foo"),
        ExceptionKind::None,
        Some(ExceptionKind::None),
        |session| {
            session.step("power on");
            session.pass("rail stable");
        },
    );

    let files = test.phase_log_files();
    assert!(files.iter().all(|name| !name.contains("_X_")), "files: {files:?}");
    let call = find_file(&files, 'P', "test_mod.py_test_foo_0.log");

    let contents = std::fs::read_to_string(test.log_dir().join(call)).expect("call log readable");
    let lines: Vec<_> = contents.lines().collect();
    assert_eq!(lines.len(), 2, "call log: {contents}");
    assert!(lines[0].ends_with(" [STEP 1] - power on"), "call log: {contents}");
    assert!(lines[1].ends_with(" [PASS] - rail stable"), "call log: {contents}");
    assert_eq!(test.session.state(), InvocationState::Idle);
}

#[test]
fn skipped_setup_has_no_call_record() {
    let mut test = TestSession::new();
    test.run_test(
        &RunnerContext::new("test_mod.py", "test_foo"),
        ExceptionKind::Skip,
        None,
        |_| {},
    );
    test.session.info("between tests");

    let key = TestInvocationKey::new("test_mod.py", "test_foo", 0);
    let record = test.session.store().get(&key).expect("invocation recorded");
    assert_eq!(
        record.phase(Phase::Setup).map(|phase| phase.status()),
        Some(PhaseStatus::Skipped)
    );
    assert!(record.phase(Phase::Call).is_none());
    assert_eq!(
        record.phase(Phase::Teardown).map(|phase| phase.status()),
        Some(PhaseStatus::Passed)
    );
    assert!(test.session.faults().is_empty());

    let files = test.phase_log_files();
    assert_eq!(files.len(), 1, "files: {files:?}");
    find_file(&files, 'S', "test_mod.py_test_foo_setup_0.log");
}

#[test]
fn failing_outcomes_map_to_markers() {
    let mut test = TestSession::new();
    test.run_test(
        &RunnerContext::new("test_mod.py", "test_fail"),
        ExceptionKind::None,
        Some(ExceptionKind::Fail),
        |session| session.fail("mismatch"),
    );
    test.run_test(
        &RunnerContext::new("test_mod.py", "test_error"),
        ExceptionKind::Other,
        None,
        |_| {},
    );

    let files = test.phase_log_files();
    find_file(&files, 'F', "test_mod.py_test_fail_0.log");
    find_file(&files, 'E', "test_mod.py_test_error_setup_0.log");
}

#[test]
fn fake_setup_lines_are_omitted_from_call() {
    let mut test = TestSession::new();
    test.run_test(
        &RunnerContext::new("test_mod.py", "test_foo"),
        ExceptionKind::None,
        Some(ExceptionKind::None),
        |session| {
            session.info("one");
            {
                let mut guard = session.enter_fake_setup();
                guard.info("configuring fixture");
                guard.finish(PhaseStatus::Passed);
            }
            session.info("two");
        },
    );

    let key = TestInvocationKey::new("test_mod.py", "test_foo", 0);
    let record = test.session.store().get(&key).expect("invocation recorded");
    let call = record.phase(Phase::Call).expect("call recorded").log();
    let messages: Vec<_> = call
        .lines()
        .map(|line| line.rsplit(" - ").next().unwrap_or_default())
        .collect();
    assert_eq!(messages, ["one", "two"]);

    let setup = record.phase(Phase::Setup).expect("setup recorded").log();
    assert!(setup.contains("configuring fixture"), "setup log: {setup}");
}

#[test]
fn fake_setup_is_released_on_panic() {
    let mut test = TestSession::new();
    let session = &mut test.session;
    session.setup_started(&RunnerContext::new("test_mod.py", "test_foo"));
    session.setup_finished(PhaseOutcome::passed());
    session.call_started();

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let mut guard = session.enter_fake_setup();
        guard.info("about to fail");
        panic!("fixture exploded");
    }));
    assert!(result.is_err());

    let destinations = session.router().destinations();
    assert_eq!(destinations.len(), 1);
    assert!(!destinations[0].is_masked());

    session.info("still logging");
    session.call_finished(PhaseOutcome::passed());
    session.teardown_started();
    session.teardown_finished(PhaseOutcome::passed());

    let files = test.phase_log_files();
    find_file(&files, 'P', "test_mod.py_test_foo_setup_0.log");
    find_file(&files, 'U', "test_mod.py_test_foo_setup_0.log");
    let call = find_file(&files, 'P', "test_mod.py_test_foo_0.log");
    let contents = std::fs::read_to_string(test.log_dir().join(call)).expect("call log readable");
    assert!(contents.contains("still logging"), "call log: {contents}");
    assert!(!contents.contains("about to fail"), "call log: {contents}");
}

/// Returns the messages in a log file, without timestamps and labels.
fn file_messages(test: &TestSession, name: &str) -> Vec<String> {
    std::fs::read_to_string(test.log_dir().join(name))
        .unwrap_or_else(|error| panic!("{name} readable: {error}"))
        .lines()
        .map(|line| line.rsplit(" - ").next().unwrap_or_default().to_owned())
        .collect()
}

#[test]
fn nested_fake_setups_write_separate_files() {
    let mut test = TestSession::new();
    test.run_test(
        &RunnerContext::new("test_mod.py", "test_foo"),
        ExceptionKind::None,
        Some(ExceptionKind::None),
        |session| {
            let mut outer = session.enter_fake_setup();
            outer.info("outer-1");
            {
                let mut inner = outer.enter_fake_setup();
                inner.info("inner");
                inner.finish(PhaseStatus::Failed);
            }
            outer.info("outer-2");
            outer.finish(PhaseStatus::Passed);
        },
    );

    let files = test.phase_log_files();
    assert_eq!(files.len(), 4, "files: {files:?}");
    let inner = find_file(&files, 'F', "test_mod.py_test_foo_setup_0.log");
    assert_eq!(file_messages(&test, inner), ["inner"]);

    // The real setup and the outer fake setup both passed. If they were opened within the same
    // second, the later one carries a `-1` disambiguator.
    let mut passed: Vec<_> = files
        .iter()
        .filter(|name| name.contains("_P_test_mod.py_test_foo_setup_0"))
        .map(|name| file_messages(&test, name))
        .collect();
    passed.sort();
    assert_eq!(
        passed,
        [Vec::<String>::new(), vec!["outer-1".to_owned(), "outer-2".to_owned()]]
    );
    find_file(&files, 'P', "test_mod.py_test_foo_0.log");
    assert!(files.iter().all(|name| !name.contains("_X_")), "files: {files:?}");
}

#[test]
fn fake_setup_during_setup_keeps_both_outcomes() {
    let mut test = TestSession::new();
    let session = &mut test.session;
    session.setup_started(&RunnerContext::new("test_mod.py", "test_foo"));
    session.info("real-1");
    {
        let mut guard = session.enter_fake_setup();
        guard.info("fake");
        guard.finish(PhaseStatus::Skipped);
    }
    session.info("real-2");
    session.setup_finished(PhaseOutcome::passed());
    session.teardown_started();
    session.teardown_finished(PhaseOutcome::passed());

    let files = test.phase_log_files();
    assert_eq!(files.len(), 2, "files: {files:?}");
    let fake = find_file(&files, 'S', "test_mod.py_test_foo_setup_0.log");
    assert_eq!(file_messages(&test, fake), ["fake"]);
    let real = find_file(&files, 'P', "test_mod.py_test_foo_setup_0.log");
    assert_eq!(file_messages(&test, real), ["real-1", "real-2"]);
}

#[test]
fn setup_during_call_suspends_the_running_invocation() {
    let mut test = TestSession::new();
    let outer = RunnerContext::new("test_mod.py", "test_outer");
    let inner = RunnerContext::new("test_mod.py", "test_inner");
    let session = &mut test.session;

    session.setup_started(&outer);
    session.setup_finished(PhaseOutcome::passed());
    session.call_started();
    session.info("outer before");

    session.setup_started(&inner);
    assert_eq!(session.state(), InvocationState::SetupMaskingCall);
    session.info("inner setup");
    session.setup_finished(PhaseOutcome::passed());
    session.call_started();
    session.info("inner call");
    session.call_finished(PhaseOutcome::passed());
    session.teardown_started();
    session.info("inner teardown");
    session.teardown_finished(PhaseOutcome::passed());

    assert_eq!(session.state(), InvocationState::CallOpen);
    session.info("outer after");
    session.call_finished(PhaseOutcome::new(ExceptionKind::Fail));
    session.teardown_started();
    session.teardown_finished(PhaseOutcome::passed());
    assert_eq!(session.state(), InvocationState::Idle);

    let store = session.store();
    let outer_call = store
        .get(&TestInvocationKey::new("test_mod.py", "test_outer", 0))
        .and_then(|record| record.phase(Phase::Call))
        .expect("outer call recorded");
    assert_eq!(outer_call.status(), PhaseStatus::Failed);
    let messages: Vec<_> = outer_call
        .log()
        .lines()
        .map(|line| line.rsplit(" - ").next().unwrap_or_default())
        .collect();
    assert_eq!(messages, ["outer before", "outer after"]);

    let inner_call = store
        .get(&TestInvocationKey::new("test_mod.py", "test_inner", 0))
        .and_then(|record| record.phase(Phase::Call))
        .expect("inner call recorded");
    let messages: Vec<_> = inner_call
        .log()
        .lines()
        .map(|line| line.rsplit(" - ").next().unwrap_or_default())
        .collect();
    assert_eq!(messages, ["inner call", "inner teardown"]);

    let files = test.phase_log_files();
    let outer_file = find_file(&files, 'F', "test_mod.py_test_outer_0.log");
    let contents =
        std::fs::read_to_string(test.log_dir().join(outer_file)).expect("outer call log readable");
    assert!(!contents.contains("inner"), "outer call log: {contents}");
    find_file(&files, 'P', "test_mod.py_test_inner_0.log");
}

#[test]
fn teardown_lines_join_the_call_log() {
    let mut test = TestSession::new();
    let session = &mut test.session;
    session.setup_started(&RunnerContext::new("test_mod.py", "test_foo"));
    session.setup_finished(PhaseOutcome::passed());
    session.call_started();
    session.info("in call");
    session.call_finished(PhaseOutcome::passed());
    session.teardown_started();
    session.info("releasing fixture");
    session.teardown_finished(PhaseOutcome::passed());

    let record = session
        .store()
        .get(&TestInvocationKey::new("test_mod.py", "test_foo", 0))
        .expect("invocation recorded");
    let call = record.phase(Phase::Call).expect("call recorded").log();
    assert!(call.contains("releasing fixture"), "call log: {call}");

    // The call file was already closed, so it doesn't see teardown lines.
    let files = test.phase_log_files();
    let call_file = find_file(&files, 'P', "test_mod.py_test_foo_0.log");
    let contents =
        std::fs::read_to_string(test.log_dir().join(call_file)).expect("call log readable");
    assert!(!contents.contains("releasing fixture"), "call file: {contents}");
}

#[test]
fn missing_identity_is_a_fault_not_a_panic() {
    let mut test = TestSession::new();
    let context = RunnerContext {
        path: None,
        testcase: Some("test_foo".to_owned()),
        params: Default::default(),
    };
    test.session.setup_started(&context);
    test.session.setup_finished(PhaseOutcome::passed());

    assert_eq!(test.session.faults().len(), 1);
    assert_eq!(test.session.store().invocation_count(), 0);
    assert!(
        test.cmd_text().contains("[WARNING] - test identity could not be resolved"),
        "command line: {}",
        test.cmd_text()
    );
}
