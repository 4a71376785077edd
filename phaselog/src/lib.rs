// Copyright (c) The phaselog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command-line driver for phaselog.
//!
//! `phaselog replay` drives a session from a JSON lines event file written by a test runner, and
//! `phaselog summary` prints the summary table of an existing session export document.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::{OutputContext, OutputWriter};
