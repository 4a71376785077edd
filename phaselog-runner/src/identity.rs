// Copyright (c) The phaselog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolving runner context into test invocation identities.

use crate::{errors::ContextError, helpers::source_basename, store::RunMetadataStore};
use camino::Utf8PathBuf;
use phaselog_metadata::TestInputs;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Context supplied by the test runner when a test's setup starts.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunnerContext {
    /// The path to the source file containing the test.
    #[serde(default)]
    pub path: Option<Utf8PathBuf>,

    /// The name of the test function, without parametrization.
    #[serde(default)]
    pub testcase: Option<String>,

    /// Parametrization values for this invocation.
    #[serde(default)]
    pub params: TestInputs,
}

impl RunnerContext {
    /// Creates a new context for the given path and test case.
    pub fn new(path: impl Into<Utf8PathBuf>, testcase: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            testcase: Some(testcase.into()),
            params: TestInputs::new(),
        }
    }

    /// Adds a parametrization value.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

/// Identifies a single invocation of a test case within a session.
///
/// The index counts how many times the same `(filename, testcase)` pair has been seen before in
/// the session.
#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct TestInvocationKey {
    /// The basename of the test's source file.
    pub filename: String,

    /// The test case name.
    pub testcase: String,

    /// The invocation index.
    pub index: usize,
}

impl TestInvocationKey {
    /// Creates a new key.
    pub fn new(filename: impl Into<String>, testcase: impl Into<String>, index: usize) -> Self {
        Self {
            filename: filename.into(),
            testcase: testcase.into(),
            index,
        }
    }
}

impl fmt::Display for TestInvocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}[{}]", self.filename, self.testcase, self.index)
    }
}

/// Resolves the key for a new invocation described by `context`.
///
/// The index is the number of invocations already recorded for the pair, so the caller must begin
/// the invocation on the store before resolving another one.
pub(crate) fn resolve(
    context: &RunnerContext,
    store: &RunMetadataStore,
) -> Result<TestInvocationKey, ContextError> {
    let filename = context
        .path
        .as_deref()
        .and_then(source_basename)
        .ok_or(ContextError::MissingFilename)?;
    let testcase = context
        .testcase
        .as_deref()
        .filter(|testcase| !testcase.is_empty())
        .ok_or_else(|| ContextError::MissingTestcase {
            filename: filename.to_owned(),
        })?;

    let index = store.next_index(filename, testcase);
    Ok(TestInvocationKey::new(filename, testcase, index))
}
