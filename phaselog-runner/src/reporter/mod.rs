// Copyright (c) The phaselog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session-level reporting: per-test tallies, the summary table and JUnit output.

mod aggregator;
mod displayer;
pub(crate) mod junit;

pub use aggregator::{SessionAggregator, TestTally};
pub use displayer::SummaryDisplayer;
