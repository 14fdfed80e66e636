//! Diagnostic severity.

use std::fmt;

/// How serious a [`Diagnostic`](super::Diagnostic) is.
///
/// Any error on a directive makes the sub-submission built from it fail
/// before it reaches a kernel; warnings are reported and otherwise ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// The directive or submission cannot be executed as written.
    Error,

    /// Advisory only; execution may proceed.
    Warning,
}

impl Severity {
    /// Returns `true` if this is an error severity.
    pub fn is_error(&self) -> bool {
        matches!(self, Severity::Error)
    }

    /// Returns `true` if this is a warning severity.
    pub fn is_warning(&self) -> bool {
        matches!(self, Severity::Warning)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}
