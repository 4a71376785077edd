// Copyright (c) The phaselog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The end-of-session summary table.

use super::aggregator::{SessionAggregator, TestTally};
use crate::helpers::{FormattedDuration, plural};
use owo_colors::{OwoColorize, Style};
use std::io::{self, Write};
use swrite::{SWrite, swrite, swriteln};

const TABLE_WIDTH: usize = 80;

/// Renders a [`SessionAggregator`] as a text table.
#[derive(Clone, Debug, Default)]
pub struct SummaryDisplayer {
    styles: Styles,
}

impl SummaryDisplayer {
    /// Creates a displayer with no colors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables colorized output.
    pub fn colorize(&mut self) {
        self.styles.colorize();
    }

    /// Renders the table. Returns an empty string if nothing was recorded.
    pub fn render(&self, aggregator: &SessionAggregator) -> String {
        let mut out = String::new();
        if !aggregator.has_results() {
            return out;
        }

        let name_width = aggregator
            .iter()
            .map(|(name, _)| name.len())
            .chain(std::iter::once("Test Name".len()))
            .max()
            .unwrap_or_default()
            + 2;
        let heavy = "=".repeat(TABLE_WIDTH);
        let light = "-".repeat(TABLE_WIDTH);

        swriteln!(out, "{}", heavy.style(self.styles.rule));
        swriteln!(out, "{}", " TEST EXECUTION SUMMARY".style(self.styles.title));
        swriteln!(out, "{}", heavy.style(self.styles.rule));

        let header = format!(
            "{:<name_width$} {:>10} {:>6} {:>6} {:>6} {:>6} {:>10}",
            "Test Name", "Executions", "PASS", "FAIL", "SKIP", "ERROR", "DURATION",
        );
        swriteln!(out, "{}", header.style(self.styles.header));
        swriteln!(out, "{light}");

        for (name, tally) in aggregator.iter() {
            self.write_row(&mut out, name, tally, name_width);
        }

        let totals = aggregator.totals();
        swriteln!(out, "{light}");
        self.write_row(&mut out, "TOTAL", &totals, name_width);
        swriteln!(out, "{}", heavy.style(self.styles.rule));
        swriteln!(
            out,
            "{} {} across {} {}",
            totals.executions.style(self.styles.count),
            plural::invocations_str(totals.executions),
            aggregator.iter().count().style(self.styles.count),
            plural::tests_str(aggregator.iter().count()),
        );
        out
    }

    /// Writes the table to `writer`.
    pub fn write_to(&self, aggregator: &SessionAggregator, mut writer: impl Write) -> io::Result<()> {
        writer.write_all(self.render(aggregator).as_bytes())?;
        writer.flush()
    }

    fn write_row(&self, out: &mut String, name: &str, tally: &TestTally, name_width: usize) {
        let highlight = |count: usize, style: Style| {
            if count > 0 { style } else { Style::new() }
        };

        swrite!(out, "{name:<name_width$} {:>10} ", tally.executions);
        swrite!(
            out,
            "{} ",
            format!("{:>6}", tally.passed).style(highlight(tally.passed, self.styles.pass))
        );
        swrite!(
            out,
            "{} ",
            format!("{:>6}", tally.failed).style(highlight(tally.failed, self.styles.fail))
        );
        swrite!(
            out,
            "{} ",
            format!("{:>6}", tally.skipped).style(highlight(tally.skipped, self.styles.skip))
        );
        swrite!(
            out,
            "{} ",
            format!("{:>6}", tally.errors).style(highlight(tally.errors, self.styles.fail))
        );
        swriteln!(out, "{:>10}", FormattedDuration(tally.duration).to_string());
    }
}

#[derive(Clone, Debug, Default)]
struct Styles {
    rule: Style,
    title: Style,
    header: Style,
    count: Style,
    pass: Style,
    fail: Style,
    skip: Style,
}

impl Styles {
    fn colorize(&mut self) {
        self.rule = Style::new().bold();
        self.title = Style::new().blue().bold();
        self.header = Style::new().bold();
        self.count = Style::new().bold();
        self.pass = Style::new().green().bold();
        self.fail = Style::new().red().bold();
        self.skip = Style::new().yellow().bold();
    }
}
