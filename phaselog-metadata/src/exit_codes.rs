// Copyright (c) The phaselog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `phaselog` failures.
///
/// `phaselog` runs may fail for a variety of reasons. This structure documents the exit codes
/// that may occur in case of expected failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum PhaselogExitCode {}

impl PhaselogExitCode {
    /// No errors occurred and phaselog exited normally.
    pub const OK: i32 = 0;

    /// No invocations were recorded, but no other errors occurred.
    pub const NO_TESTS_RUN: i32 = 4;

    /// One or more invocations failed or errored.
    pub const TEST_RUN_FAILED: i32 = 100;

    /// An event stream could not be read or parsed.
    pub const EVENT_STREAM_INVALID: i32 = 104;

    /// A session export document could not be read or parsed.
    pub const EXPORT_DOCUMENT_INVALID: i32 = 105;

    /// Writing the export document or the JUnit report produced an error.
    pub const EXPORT_FAILED: i32 = 106;

    /// Writing data to stdout or stderr produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;

    /// A user issue happened while setting up a phaselog invocation.
    pub const SETUP_ERROR: i32 = 96;
}
