// Copyright (c) The phaselog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JUnit XML output for a session.

use phaselog_metadata::{InvocationSummary, PhaseStatus, RunInfoSummary};
use quick_junit::{NonSuccessKind, Report, TestCase, TestCaseStatus, TestSuite};
use std::time::Duration;

/// Builds a JUnit report from a session export document.
///
/// Each source file becomes a test suite, and each invocation a test case named
/// `testcase[index]`.
pub(crate) fn build_report(report_name: &str, summary: &RunInfoSummary) -> Report {
    let mut report = Report::new(report_name);
    let mut total_time = Duration::ZERO;

    for (filename, testcases) in &summary.testinfo {
        let mut test_suite = TestSuite::new(filename.as_str());
        for (testcase, invocations) in testcases {
            for invocation in invocations {
                let time = invocation.total_duration();
                total_time += time;
                test_suite.add_test_case(build_test_case(filename, testcase, invocation, time));
            }
        }
        report.add_test_suite(test_suite);
    }

    report.set_time(total_time);
    report
}

fn build_test_case(
    filename: &str,
    testcase: &str,
    invocation: &InvocationSummary,
    time: Duration,
) -> TestCase {
    let outcome = invocation.outcome();
    let status = match outcome {
        PhaseStatus::Passed => TestCaseStatus::success(),
        PhaseStatus::Skipped => TestCaseStatus::skipped(),
        PhaseStatus::Failed => {
            let mut status = TestCaseStatus::non_success(NonSuccessKind::Failure);
            status.set_type("test failure");
            status
        }
        PhaseStatus::Error | PhaseStatus::Unknown => {
            let mut status = TestCaseStatus::non_success(NonSuccessKind::Error);
            status.set_type(if outcome == PhaseStatus::Error {
                "test error"
            } else {
                "no result recorded"
            });
            status
        }
    };

    let mut test_case = TestCase::new(format!("{testcase}[{}]", invocation.index), status);
    test_case.set_classname(filename).set_time(time);

    if let Some(start) = invocation.setup.as_ref().and_then(|setup| setup.start) {
        test_case.set_timestamp(start);
    }
    if let Some(call) = &invocation.call {
        if !call.log.is_empty() {
            test_case.set_system_out(call.log.as_str());
        }
    }
    test_case
}
