// Copyright (c) The phaselog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Severities: the levels attached to every log entry, and the thresholds sinks filter by.
//!
//! Severities are ordered by numeric value. A sink with threshold `t` accepts every entry whose
//! severity is at least `t`.

use crate::errors::SeverityParseError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

/// The severity of a log entry.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[non_exhaustive]
pub enum Severity {
    /// Diagnostic detail.
    Debug,

    /// General information.
    Info,

    /// A numbered test step.
    Step,

    /// A numbered sub-step of the current step.
    Substep,

    /// A check that passed.
    Pass,

    /// A register read-back that matched.
    RwOk,

    /// Something unexpected that didn't fail the test.
    Warning,

    /// A check that failed.
    Fail,

    /// A register read-back that didn't match.
    RwFailed,

    /// An error.
    Error,

    /// An unrecoverable error.
    Critical,
}

impl Severity {
    /// All severities, in ascending order.
    pub const ALL: [Self; 11] = [
        Self::Debug,
        Self::Info,
        Self::Step,
        Self::Substep,
        Self::Pass,
        Self::RwOk,
        Self::Warning,
        Self::Fail,
        Self::RwFailed,
        Self::Error,
        Self::Critical,
    ];

    /// Returns the numeric value of this severity.
    pub fn value(self) -> u8 {
        match self {
            Self::Debug => 10,
            Self::Info => 20,
            Self::Step => 21,
            Self::Substep => 22,
            Self::Pass => 23,
            Self::RwOk => 24,
            Self::Warning => 30,
            Self::Fail => 31,
            Self::RwFailed => 32,
            Self::Error => 40,
            Self::Critical => 50,
        }
    }

    /// Returns the label written in log lines.
    pub fn label(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Step => "STEP",
            Self::Substep => "SUB-STEP",
            Self::Pass => "PASS",
            Self::RwOk => "R/W OK",
            Self::Warning => "WARNING",
            Self::Fail => "FAIL",
            Self::RwFailed => "R/W FAILED",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }

    /// Returns the name used in configuration and event streams.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Step => "step",
            Self::Substep => "substep",
            Self::Pass => "pass",
            Self::RwOk => "rw-ok",
            Self::Warning => "warning",
            Self::Fail => "fail",
            Self::RwFailed => "rw-failed",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }

    /// Returns the names of all severities, in ascending order.
    pub fn variants() -> Vec<&'static str> {
        Self::ALL.iter().map(|severity| severity.as_str()).collect()
    }

    /// Returns true if an entry at this severity passes a sink with the given threshold.
    pub fn passes(self, threshold: Severity) -> bool {
        self.value() >= threshold.value()
    }
}

impl FromStr for Severity {
    type Err = SeverityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        Self::ALL
            .into_iter()
            .find(|severity| normalize(severity.label()) == normalized)
            .ok_or_else(|| SeverityParseError::new(s))
    }
}

// "R/W OK", "rw-ok" and "RW_OK" all normalize to "RWOK".
fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_' | '/'))
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("info", Severity::Info ; "lowercase")]
    #[test_case("WARNING", Severity::Warning ; "uppercase")]
    #[test_case("sub-step", Severity::Substep ; "dashed label")]
    #[test_case("SUB_STEP", Severity::Substep ; "underscored label")]
    #[test_case("substep", Severity::Substep ; "config name")]
    #[test_case("rw-ok", Severity::RwOk ; "rw ok config name")]
    #[test_case("R/W FAILED", Severity::RwFailed ; "rw failed label")]
    #[test_case(" critical ", Severity::Critical ; "padded")]
    fn parse_severity(input: &str, expected: Severity) {
        assert_eq!(input.parse::<Severity>().unwrap(), expected);
    }

    #[test]
    fn parse_unknown_severity() {
        let error = "verbose".parse::<Severity>().unwrap_err();
        let message = error.to_string();
        assert!(
            message.starts_with("unrecognized value for severity: verbose"),
            "message: {message}"
        );
        assert!(message.contains("rw-failed"), "message lists known values: {message}");
    }

    #[test]
    fn ordering_matches_values() {
        for window in Severity::ALL.windows(2) {
            assert!(window[0] < window[1]);
            assert!(window[0].value() < window[1].value());
        }
        assert!(Severity::Pass.passes(Severity::Info));
        assert!(!Severity::Debug.passes(Severity::Info));
        assert!(Severity::Info.passes(Severity::Info));
    }
}
