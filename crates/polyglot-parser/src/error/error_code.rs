//! Error codes for directive diagnostics.

use std::fmt;

/// Stable codes attached to every diagnostic the parser produces.
///
/// Codes are what tests and tooling match on; messages may be reworded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // =========================================================================
    // Tokenizer Errors (E0xx)
    // =========================================================================
    /// Unterminated quoted value.
    ///
    /// A directive argument opened a `"` that was never closed before the end
    /// of the line.
    E001,

    // =========================================================================
    // Resolution Errors (E1xx)
    // =========================================================================
    /// Unrecognized directive.
    ///
    /// A line starting with the control marker `#!` names neither a kernel
    /// nor an action available in the active kernel.
    E100,

    /// Missing directive name.
    ///
    /// The control marker `#!` stands alone with no name after it.
    E101,

    // =========================================================================
    // Option Errors (E2xx)
    // =========================================================================
    /// Unknown option.
    ///
    /// The directive does not declare an option with this spelling.
    E200,

    /// Missing option value.
    ///
    /// An option that takes a value was given none.
    E201,

    /// Invalid value.
    ///
    /// A value failed the validator declared for its option or argument, or a
    /// flag was given a value.
    E202,

    /// Unexpected argument.
    ///
    /// More positional arguments were supplied than the directive accepts.
    E203,

    /// Missing required option.
    E204,

    /// Missing required argument.
    E205,

    /// Duplicate option.
    ///
    /// A single-valued option or flag was given more than once.
    E206,
}

impl ErrorCode {
    /// Returns the error code as a string (e.g., "E001").
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E001 => "E001",
            ErrorCode::E100 => "E100",
            ErrorCode::E101 => "E101",
            ErrorCode::E200 => "E200",
            ErrorCode::E201 => "E201",
            ErrorCode::E202 => "E202",
            ErrorCode::E203 => "E203",
            ErrorCode::E204 => "E204",
            ErrorCode::E205 => "E205",
            ErrorCode::E206 => "E206",
        }
    }

    /// Returns a brief description of the error.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::E001 => "unterminated quoted value",
            ErrorCode::E100 => "unrecognized directive",
            ErrorCode::E101 => "missing directive name",
            ErrorCode::E200 => "unknown option",
            ErrorCode::E201 => "missing option value",
            ErrorCode::E202 => "invalid value",
            ErrorCode::E203 => "unexpected argument",
            ErrorCode::E204 => "missing required option",
            ErrorCode::E205 => "missing required argument",
            ErrorCode::E206 => "duplicate option",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::E001.to_string(), "E001");
        assert_eq!(ErrorCode::E100.to_string(), "E100");
        assert_eq!(ErrorCode::E206.to_string(), "E206");
    }

    #[test]
    fn test_error_code_description() {
        assert_eq!(ErrorCode::E100.description(), "unrecognized directive");
        assert_eq!(ErrorCode::E200.description(), "unknown option");
    }
}
