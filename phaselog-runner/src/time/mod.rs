// Copyright (c) The phaselog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Phase timing.

mod stopwatch;

pub use stopwatch::PhaseTiming;
pub(crate) use stopwatch::{StopwatchStart, stopwatch};
