// Copyright (c) The phaselog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::{TestSession, find_file};
use indoc::indoc;
use phaselog_metadata::{Phase, PhaseStatus};
use phaselog_runner::{events::RunnerEvent, lifecycle::InvocationState};
use pretty_assertions::assert_eq;

const EVENTS: &str = indoc! {r#"
    # test_foo, parametrized twice
    {"event": "setup-started", "path": "tests/test_mod.py", "testcase": "test_foo", "params": {"x": 1}}
    {"event": "setup-finished"}
    {"event": "call-started"}
    {"event": "log", "level": "step", "message": "power on"}
    {"event": "fake-setup-started"}
    {"event": "log", "level": "info", "message": "reconfiguring"}
    {"event": "fake-setup-finished"}
    {"event": "register", "name": "CTRL", "write": 5, "read": 5}
    {"event": "call-finished", "start": "2024-03-09T14:05:07+01:00", "stop": "2024-03-09T14:05:08.5+01:00"}
    {"event": "teardown-started"}
    {"event": "teardown-finished"}

    {"event": "setup-started", "path": "tests/test_mod.py", "testcase": "test_foo", "params": {"x": 2}}
    {"event": "setup-finished"}
    {"event": "call-started"}
    {"event": "log", "level": "fail", "message": "x is even"}
    {"event": "call-finished", "exception": "fail"}
    {"event": "teardown-started"}
    {"event": "teardown-finished"}
"#};

#[test]
fn replay_event_stream() {
    let events = RunnerEvent::parse_lines(EVENTS).expect("events parse");
    let mut test = TestSession::new();
    test.session.replay(&events).expect("replay succeeded");
    assert_eq!(test.session.state(), InvocationState::Idle);
    assert!(test.session.faults().is_empty());

    let snapshot = test.session.store().snapshot();
    let records = &snapshot.testinfo["test_mod.py"]["test_foo"];
    assert_eq!(records.len(), 2);

    let first = records[0].phase(Phase::Call).expect("first call recorded");
    assert_eq!(first.status, PhaseStatus::Passed);
    assert_eq!(first.duration, Some(1.5));
    assert_eq!(
        first.inputs.as_ref().and_then(|inputs| inputs.get("x")),
        Some(&serde_json::json!(1))
    );
    let messages: Vec<_> = first
        .log
        .lines()
        .map(|line| line.rsplit(" - ").next().unwrap_or_default())
        .collect();
    assert_eq!(messages, ["power on", "CTRL: 0x5 (Readback: 0x5)"]);
    assert!(
        records[0]
            .phase(Phase::Setup)
            .is_some_and(|setup| setup.log.contains("reconfiguring"))
    );

    let second = records[1].phase(Phase::Call).expect("second call recorded");
    assert_eq!(second.status, PhaseStatus::Failed);

    let files = test.phase_log_files();
    find_file(&files, 'P', "test_mod.py_test_foo_0.log");
    find_file(&files, 'F', "test_mod.py_test_foo_1.log");
    assert!(files.iter().all(|name| !name.contains("_X_")), "files: {files:?}");

    let aggregator = test.session.aggregate();
    let (name, tally) = aggregator.iter().next().expect("one test tallied");
    assert_eq!(name, "test_foo");
    assert_eq!((tally.executions, tally.passed, tally.failed), (2, 1, 1));
    assert!(aggregator.has_failures());
}

#[test]
fn unbalanced_stream_is_rejected_before_any_event_applies() {
    let events = RunnerEvent::parse_lines(indoc! {r#"
        {"event": "setup-started", "path": "test_mod.py", "testcase": "test_foo"}
        {"event": "fake-setup-started"}
    "#})
    .expect("events parse");

    let mut test = TestSession::new();
    test.session.replay(&events).unwrap_err();
    assert_eq!(test.session.store().invocation_count(), 0);
    assert!(test.phase_log_files().is_empty());
}
