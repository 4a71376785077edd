// Copyright (c) The phaselog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::{TestSession, find_file};
use phaselog_metadata::{Phase, PhaseStatus, RunInfoSummary};
use phaselog_runner::{
    identity::RunnerContext,
    lifecycle::ExceptionKind,
    reporter::SummaryDisplayer,
    router::Severity,
    session::JunitSettings,
};
use pretty_assertions::assert_eq;

#[test]
fn parametrized_test_pass_then_fail() {
    let mut test = TestSession::new();
    let first = RunnerContext::new("tests/test_mod.py", "test_foo").with_param("voltage", 3.3);
    let second = RunnerContext::new("tests/test_mod.py", "test_foo").with_param("voltage", 5.0);

    test.run_test(&first, ExceptionKind::None, Some(ExceptionKind::None), |session| {
        session.info("measuring at 3.3V");
    });
    test.run_test(&second, ExceptionKind::None, Some(ExceptionKind::Fail), |session| {
        session.fail("overvoltage");
    });

    let export_path = test.dir.path().join("out/run-info.json");
    test.session.export(&export_path).expect("export succeeded");
    let summary = RunInfoSummary::read_from(&export_path).expect("export is readable");

    let records = &summary.testinfo["test_mod.py"]["test_foo"];
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].index, 0);
    assert_eq!(records[1].index, 1);

    let first_call = records[0].phase(Phase::Call).expect("first call recorded");
    assert_eq!(first_call.status, PhaseStatus::Passed);
    assert_eq!(
        first_call.inputs.as_ref().and_then(|inputs| inputs.get("voltage")),
        Some(&serde_json::json!(3.3))
    );
    assert!(first_call.log.contains("measuring at 3.3V"));

    let second_call = records[1].phase(Phase::Call).expect("second call recorded");
    assert_eq!(second_call.status, PhaseStatus::Failed);
    assert!(second_call.log.contains("[FAIL] - overvoltage"));

    let files = test.phase_log_files();
    let passed = find_file(&files, 'P', "test_mod.py_test_foo_0.log");
    let failed = find_file(&files, 'F', "test_mod.py_test_foo_1.log");
    assert_ne!(passed, failed);
}

#[test]
fn export_totals_match_call_records() {
    let mut test = TestSession::new();
    let outcomes = [
        ("test_a", ExceptionKind::None, Some(ExceptionKind::None)),
        ("test_b", ExceptionKind::None, Some(ExceptionKind::Fail)),
        ("test_c", ExceptionKind::Skip, None),
        ("test_d", ExceptionKind::None, Some(ExceptionKind::Skip)),
        ("test_e", ExceptionKind::None, Some(ExceptionKind::Other)),
        ("test_a", ExceptionKind::None, Some(ExceptionKind::None)),
    ];
    for (testcase, setup, call) in outcomes {
        test.run_test(
            &RunnerContext::new("test_mod.py", testcase),
            setup,
            call,
            |_| {},
        );
    }

    let export_path = test.log_dir().join("run-info.json");
    test.session.export(&export_path).expect("export succeeded");
    let json = std::fs::read_to_string(&export_path).expect("export readable");
    let summary = RunInfoSummary::parse_json(&json).expect("export parses");

    let count = |status| {
        summary
            .invocations()
            .filter_map(|(_, _, invocation)| invocation.phase(Phase::Call))
            .filter(|call| call.status == status)
            .count()
    };
    assert_eq!(summary.total_passed, count(PhaseStatus::Passed));
    assert_eq!(summary.total_failed, count(PhaseStatus::Failed));
    assert_eq!(summary.total_skipped, count(PhaseStatus::Skipped));
    assert_eq!(
        (summary.total_passed, summary.total_failed, summary.total_skipped),
        (2, 1, 1)
    );
    assert_eq!(summary.invocation_count(), 6);

    // Exporting doesn't change the store.
    assert_eq!(test.session.store().invocation_count(), 6);
    assert_eq!(
        test.session.store().snapshot().testinfo.keys().collect::<Vec<_>>(),
        summary.testinfo.keys().collect::<Vec<_>>()
    );
}

#[test]
fn register_entries() {
    let mut test = TestSession::new();
    test.run_test(
        &RunnerContext::new("test_regs.py", "test_ctrl"),
        ExceptionKind::None,
        Some(ExceptionKind::None),
        |session| {
            assert!(session.rw("CTRL", 5, 5));
            assert!(!session.rw("STATUS", 5, 6));
            assert!(!session.rw("OFFSET", -1, 0));
            session.rw_message("bank 2 selected");
        },
    );

    let snapshot = test.session.store().snapshot();
    let call = snapshot.testinfo["test_regs.py"]["test_ctrl"][0]
        .phase(Phase::Call)
        .expect("call recorded");
    let lines: Vec<_> = call.log.lines().collect();
    assert_eq!(lines.len(), 4, "call log: {}", call.log);
    assert!(
        lines[0].ends_with("[R/W OK] - CTRL: 0x5 (Readback: 0x5)"),
        "line: {}",
        lines[0]
    );
    assert!(
        lines[1].ends_with("[R/W FAILED] - STATUS: 0x5 (Readback: 0x6)"),
        "line: {}",
        lines[1]
    );
    assert!(
        lines[2].ends_with("[R/W FAILED] - OFFSET: -1 (Readback: 0x0)"),
        "line: {}",
        lines[2]
    );
    assert!(
        lines[3].ends_with("[R/W OK] - bank 2 selected"),
        "line: {}",
        lines[3]
    );
}

#[test]
fn finish_writes_configured_exports() {
    let mut test = TestSession::with_settings(|settings| {
        settings.router.level = Severity::Debug;
        settings.export_path = Some(settings.router.log_dir.join("run-info.json"));
        settings.junit = Some(JunitSettings {
            path: settings.router.log_dir.join("junit/report.xml"),
            report_name: "bench".to_owned(),
        });
    });
    test.run_test(
        &RunnerContext::new("test_mod.py", "test_foo"),
        ExceptionKind::None,
        Some(ExceptionKind::Fail),
        |session| session.debug("registers dumped"),
    );

    let outputs = test.session.finish().expect("exports written");
    let export = outputs.export.expect("export path reported");
    let junit = outputs.junit.expect("junit path reported");

    let summary = RunInfoSummary::read_from(&export).expect("export readable");
    assert_eq!(summary.total_failed, 1);
    assert!(summary.testinfo["test_mod.py"]["test_foo"][0]
        .phase(Phase::Call)
        .is_some_and(|call| call.log.contains("[DEBUG] - registers dumped")));

    let xml = std::fs::read_to_string(&junit).expect("junit readable");
    assert!(xml.contains(r#"name="bench""#), "xml: {xml}");
    assert!(xml.contains(r#"name="test_foo[0]""#), "xml: {xml}");
    assert!(xml.contains("<failure"), "xml: {xml}");

    let mut displayer = SummaryDisplayer::new();
    let table = displayer.render(&test.session.aggregate());
    assert!(table.contains("test_foo"), "table: {table}");
    displayer.colorize();
    assert!(displayer.render(&test.session.aggregate()).contains("TEST EXECUTION SUMMARY"));
}

#[test]
fn global_log_sees_every_entry() {
    let mut test = TestSession::new();
    test.session.info("before any test");
    test.run_test(
        &RunnerContext::new("test_mod.py", "test_foo"),
        ExceptionKind::None,
        Some(ExceptionKind::None),
        |session| session.step("inside"),
    );

    let global = test
        .session
        .router()
        .global_log_path()
        .expect("global log enabled by default")
        .to_owned();
    assert!(global.as_str().ends_with("_all.log"), "global log: {global}");
    let contents = std::fs::read_to_string(&global).expect("global log readable");
    assert!(contents.contains("[INFO] - before any test"), "global log: {contents}");
    assert!(contents.contains("[STEP 1] - inside"), "global log: {contents}");
}
