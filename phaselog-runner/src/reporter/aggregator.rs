// Copyright (c) The phaselog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-test tallies computed from store readouts.

use phaselog_metadata::{PhaseStatus, RunInfoSummary};
use std::{collections::BTreeMap, time::Duration};

/// Tallies for a single test case name, across every file and invocation.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TestTally {
    /// The number of invocations.
    pub executions: usize,

    /// Invocations that passed.
    pub passed: usize,

    /// Invocations that failed.
    pub failed: usize,

    /// Invocations that were skipped.
    pub skipped: usize,

    /// Invocations that errored.
    pub errors: usize,

    /// Total time spent across all phases of all invocations.
    pub duration: Duration,
}

impl TestTally {
    fn add(&mut self, outcome: PhaseStatus, duration: Duration) {
        self.executions += 1;
        self.duration += duration;
        match outcome {
            PhaseStatus::Passed => self.passed += 1,
            PhaseStatus::Failed => self.failed += 1,
            PhaseStatus::Skipped => self.skipped += 1,
            PhaseStatus::Error => self.errors += 1,
            PhaseStatus::Unknown => {}
        }
    }
}

/// Session-wide tallies keyed by test case name, sorted by name.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SessionAggregator {
    results: BTreeMap<String, TestTally>,
}

impl SessionAggregator {
    /// Creates an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds tallies from a session export document.
    pub fn from_summary(summary: &RunInfoSummary) -> Self {
        let mut aggregator = Self::new();
        for (_, testcase, invocation) in summary.invocations() {
            aggregator.add_result(testcase, invocation.outcome(), invocation.total_duration());
        }
        aggregator
    }

    /// Records one invocation of `testcase`.
    pub fn add_result(&mut self, testcase: &str, outcome: PhaseStatus, duration: Duration) {
        self.results
            .entry(testcase.to_owned())
            .or_default()
            .add(outcome, duration);
    }

    /// Returns true if any invocation has been recorded.
    pub fn has_results(&self) -> bool {
        !self.results.is_empty()
    }

    /// Iterates over tallies in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TestTally)> + '_ {
        self.results.iter().map(|(name, tally)| (name.as_str(), tally))
    }

    /// Returns the sum of all tallies.
    pub fn totals(&self) -> TestTally {
        self.results
            .values()
            .fold(TestTally::default(), |mut totals, tally| {
                totals.executions += tally.executions;
                totals.passed += tally.passed;
                totals.failed += tally.failed;
                totals.skipped += tally.skipped;
                totals.errors += tally.errors;
                totals.duration += tally.duration;
                totals
            })
    }

    /// Returns true if any invocation failed or errored.
    pub fn has_failures(&self) -> bool {
        self.results
            .values()
            .any(|tally| tally.failed > 0 || tally.errors > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tallies_by_name() {
        let mut aggregator = SessionAggregator::new();
        aggregator.add_result("test_foo", PhaseStatus::Passed, Duration::from_millis(100));
        aggregator.add_result("test_foo", PhaseStatus::Failed, Duration::from_millis(200));
        aggregator.add_result("test_bar", PhaseStatus::Skipped, Duration::ZERO);
        aggregator.add_result("test_bar", PhaseStatus::Unknown, Duration::ZERO);

        let names: Vec<_> = aggregator.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["test_bar", "test_foo"]);

        let (_, foo) = aggregator.iter().nth(1).unwrap();
        assert_eq!(
            *foo,
            TestTally {
                executions: 2,
                passed: 1,
                failed: 1,
                skipped: 0,
                errors: 0,
                duration: Duration::from_millis(300),
            }
        );

        let totals = aggregator.totals();
        assert_eq!((totals.executions, totals.skipped), (4, 1));
        assert!(aggregator.has_failures());
    }
}
