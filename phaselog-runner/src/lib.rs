// Copyright (c) The phaselog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for phaselog: per-test log routing and phase lifecycle tracking.
//!
//! A test runner drives a [`SessionContext`](session::SessionContext) through its hooks
//! (setup, call and teardown, each started and finished). While a phase is current, log calls
//! made through the session are written to that phase's log file, echoed to the command line and
//! to a session-wide log, and attached to the invocation's record in the
//! [`RunMetadataStore`](store::RunMetadataStore). When the session ends the store is exported as a
//! [`RunInfoSummary`](phaselog_metadata::RunInfoSummary) JSON document and, optionally, a JUnit
//! report.
//!
//! Runners that can't host the session in-process can write
//! [`RunnerEvent`](events::RunnerEvent)s to a file and replay them later.

pub mod config;
pub mod errors;
pub mod events;
pub mod helpers;
pub mod identity;
pub mod lifecycle;
pub mod reporter;
pub mod router;
pub mod session;
pub mod store;
pub mod time;
