//! The core diagnostic type.
//!
//! A [`Diagnostic`] is one error or warning with an optional error code,
//! labeled source spans and help text.

use std::fmt;

use crate::{
    error::{Severity, error_code::ErrorCode, label::Label},
    span::Span,
};

/// A diagnostic message with source location information.
///
/// Rendered by the CLI roughly as:
///
/// ```text
/// error[E200]: unknown option `--invalid-option` for `#!csharp`
///   --> notebook.dib:1:1
///    |
///  1 | #!csharp --invalid-option
///    | ^^^^^^^^^---------------- unknown option
///    | |
///    | in this directive
///    |
///    = help: `#!csharp` takes no options
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    severity: Severity,
    code: Option<ErrorCode>,
    message: String,
    labels: Vec<Label>,
    help: Option<String>,
}

impl Diagnostic {
    /// Create an error diagnostic.
    ///
    /// # Example
    ///
    /// ```
    /// # use polyglot_parser::error::{Diagnostic, ErrorCode};
    /// # use polyglot_parser::Span;
    ///
    /// let diag = Diagnostic::error("unrecognized directive `#!nope`")
    ///     .with_code(ErrorCode::E100)
    ///     .with_label(Span::new(0..6), "not a kernel or action")
    ///     .with_help("run `#!lsmagic` to list available directives");
    ///
    /// assert!(diag.severity().is_error());
    /// ```
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    /// Create a warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn code(&self) -> Option<ErrorCode> {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn help(&self) -> Option<&str> {
        self.help.as_deref()
    }

    /// Span of the first primary label, if there is one.
    ///
    /// For diagnostics attached to a directive this is the directive's span.
    pub fn primary_span(&self) -> Option<Span> {
        self.labels
            .iter()
            .find(|label| label.is_primary())
            .map(Label::span)
    }

    /// Set the error code.
    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Add a primary label to this diagnostic.
    pub fn with_label(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(Label::primary(span, message));
        self
    }

    /// Add a secondary label to this diagnostic.
    pub fn with_secondary_label(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(Label::secondary(span, message));
        self
    }

    /// Set the help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            code: None,
            message: message.into(),
            labels: Vec::new(),
            help: None,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Format: "error[E001]: message" or "error: message"
        write!(f, "{}", self.severity)?;
        if let Some(code) = self.code {
            write!(f, "[{}]", code)?;
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for Diagnostic {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_new() {
        let diag = Diagnostic::new(Severity::Error, "test error");

        assert!(diag.severity().is_error());
        assert_eq!(diag.message(), "test error");
        assert!(diag.code().is_none());
        assert!(diag.labels().is_empty());
        assert!(diag.help().is_none());
        assert!(diag.primary_span().is_none());
    }

    #[test]
    fn test_diagnostic_primary_span_skips_secondary_labels() {
        let diag = Diagnostic::error("missing value for `--name`")
            .with_secondary_label(Span::new(5..11), "expects a value")
            .with_label(Span::new(0..11), "in this directive");

        assert_eq!(diag.primary_span(), Some(Span::new(0..11)));
    }

    #[test]
    fn test_diagnostic_display_with_code() {
        let diag = Diagnostic::error("unrecognized directive `#!nope`").with_code(ErrorCode::E100);

        assert_eq!(diag.to_string(), "error[E100]: unrecognized directive `#!nope`");
    }

    #[test]
    fn test_diagnostic_display_without_code() {
        let diag = Diagnostic::warning("option given twice");

        assert_eq!(diag.to_string(), "warning: option given twice");
    }

    #[test]
    fn test_diagnostic_builder_chain() {
        let diag = Diagnostic::error("unknown option `--bogus` for `#!set`")
            .with_code(ErrorCode::E200)
            .with_label(Span::new(0..20), "in this directive")
            .with_secondary_label(Span::new(13..20), "unknown option")
            .with_help("expected one of: --name, --value, --byref");

        assert_eq!(diag.code(), Some(ErrorCode::E200));
        assert_eq!(diag.labels().len(), 2);
        assert!(diag.labels()[0].is_primary());
        assert!(diag.labels()[1].is_secondary());
        assert_eq!(diag.help(), Some("expected one of: --name, --value, --byref"));
    }
}
