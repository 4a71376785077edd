// Copyright (c) The phaselog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stopwatch for timing phases when the runner doesn't report explicit timing.
//!
//! A phase needs a start time and a duration. The start time comes from the realtime clock and
//! the duration from the monotonic clock, so the recorded duration can't go negative if the
//! system clock is adjusted mid-phase.

use chrono::{DateTime, FixedOffset, Local};
use std::time::{Duration, Instant};

pub(crate) fn stopwatch() -> StopwatchStart {
    StopwatchStart::new()
}

/// The start state of a stopwatch.
#[derive(Clone, Debug)]
pub(crate) struct StopwatchStart {
    start_time: DateTime<Local>,
    instant: Instant,
}

impl StopwatchStart {
    fn new() -> Self {
        Self {
            start_time: Local::now(),
            instant: Instant::now(),
        }
    }

    pub(crate) fn snapshot(&self) -> StopwatchSnapshot {
        StopwatchSnapshot {
            start_time: self.start_time,
            duration: self.instant.elapsed(),
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct StopwatchSnapshot {
    pub(crate) start_time: DateTime<Local>,
    pub(crate) duration: Duration,
}

impl StopwatchSnapshot {
    pub(crate) fn end_time(&self) -> DateTime<Local> {
        self.start_time + self.duration
    }

    /// Returns `(start, stop, duration in seconds)` in the form stored on phase records.
    pub(crate) fn to_timing(&self) -> PhaseTiming {
        PhaseTiming {
            start: self.start_time.fixed_offset(),
            stop: self.end_time().fixed_offset(),
            duration: self.duration.as_secs_f64(),
        }
    }
}

/// Start, stop and duration of a phase.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PhaseTiming {
    /// When the phase started.
    pub start: DateTime<FixedOffset>,

    /// When the phase stopped.
    pub stop: DateTime<FixedOffset>,

    /// How long the phase took, in seconds.
    pub duration: f64,
}
