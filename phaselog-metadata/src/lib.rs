// Copyright (c) The phaselog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Structured access to the session export document produced by phaselog.
//!
//! The document is written once per session by the run metadata store, and records every
//! invocation of every test case together with its phase results and captured logs. This crate
//! contains the serializable form of that document plus the documented exit codes of the
//! `phaselog` binary.

mod errors;
mod exit_codes;
mod run_info;

pub use errors::*;
pub use exit_codes::*;
pub use run_info::*;
