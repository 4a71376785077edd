// Copyright (c) The phaselog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests that drive a session through its runner hooks and inspect the files and
//! documents it leaves behind.

mod exports;
mod fixtures;
mod lifecycle;
mod replay;
