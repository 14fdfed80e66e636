//! Error adapter for converting PolyglotError to miette diagnostics.
//!
//! The library reports document problems as plain [`Diagnostic`] values; the
//! CLI renders them with miette. A [`PolyglotError::Parse`] holding several
//! diagnostics becomes one report per diagnostic.

use std::fmt;

use miette::{Diagnostic as MietteDiagnostic, LabeledSpan, SourceSpan};

use polyglot::PolyglotError;
use polyglot_parser::{Span, error::Diagnostic};

/// Adapter for a single document diagnostic.
pub struct DiagnosticAdapter<'a> {
    diag: &'a Diagnostic,
    src: &'a str,
}

impl<'a> DiagnosticAdapter<'a> {
    pub fn new(diag: &'a Diagnostic, src: &'a str) -> Self {
        Self { diag, src }
    }
}

impl fmt::Debug for DiagnosticAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticAdapter")
            .field("diag", &self.diag)
            .finish()
    }
}

impl fmt::Display for DiagnosticAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.diag.message())
    }
}

impl std::error::Error for DiagnosticAdapter<'_> {}

impl MietteDiagnostic for DiagnosticAdapter<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.diag
            .code()
            .map(|code| Box::new(code) as Box<dyn fmt::Display>)
    }

    fn severity(&self) -> Option<miette::Severity> {
        if self.diag.severity().is_error() {
            Some(miette::Severity::Error)
        } else {
            Some(miette::Severity::Warning)
        }
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.diag
            .help()
            .map(|help| Box::new(help) as Box<dyn fmt::Display>)
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.src as &dyn miette::SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let labels = self.diag.labels();
        if labels.is_empty() {
            return None;
        }

        Some(Box::new(labels.iter().map(|label| {
            let span = span_to_miette(label.span());
            let message = Some(label.message().to_string());
            if label.is_primary() {
                LabeledSpan::new_primary_with_span(message, span)
            } else {
                LabeledSpan::new_with_span(message, span)
            }
        })))
    }
}

/// Adapter for [`PolyglotError`] variants without source locations.
pub struct ErrorAdapter<'a>(pub &'a PolyglotError);

impl fmt::Debug for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for ErrorAdapter<'_> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl MietteDiagnostic for ErrorAdapter<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code = match &self.0 {
            PolyglotError::Io(_) => "polyglot::io",
            PolyglotError::Parse { .. } => return None,
            PolyglotError::Registry(_) => "polyglot::config",
            PolyglotError::UnknownKernel(_) => "polyglot::kernel",
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match &self.0 {
            PolyglotError::Registry(_) => Some(Box::new(
                "check the [[kernels]] and [[actions]] tables of the configuration",
            )),
            PolyglotError::UnknownKernel(_) => Some(Box::new(
                "pass a kernel name or alias declared in the configuration",
            )),
            _ => None,
        }
    }
}

/// A reportable error that can be rendered by miette.
#[derive(Debug)]
pub enum Reportable<'a> {
    Diagnostic(DiagnosticAdapter<'a>),
    Error(ErrorAdapter<'a>),
}

impl fmt::Display for Reportable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reportable::Diagnostic(d) => fmt::Display::fmt(d, f),
            Reportable::Error(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl std::error::Error for Reportable<'_> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Reportable::Diagnostic(_) => None,
            Reportable::Error(e) => e.source(),
        }
    }
}

impl MietteDiagnostic for Reportable<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match self {
            Reportable::Diagnostic(d) => d.code(),
            Reportable::Error(e) => e.code(),
        }
    }

    fn severity(&self) -> Option<miette::Severity> {
        match self {
            Reportable::Diagnostic(d) => d.severity(),
            Reportable::Error(e) => e.severity(),
        }
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match self {
            Reportable::Diagnostic(d) => d.help(),
            Reportable::Error(e) => e.help(),
        }
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        match self {
            Reportable::Diagnostic(d) => d.source_code(),
            Reportable::Error(e) => e.source_code(),
        }
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        match self {
            Reportable::Diagnostic(d) => d.labels(),
            Reportable::Error(e) => e.labels(),
        }
    }
}

fn span_to_miette(span: Span) -> SourceSpan {
    SourceSpan::new(span.start().into(), span.len())
}

/// Convert a [`PolyglotError`] into a list of reportable errors.
///
/// A [`PolyglotError::Parse`] yields one [`Reportable`] per diagnostic; any
/// other variant yields exactly one.
pub fn to_reportables(err: &PolyglotError) -> Vec<Reportable<'_>> {
    match err {
        PolyglotError::Parse {
            err: parse_err,
            src,
        } => parse_err
            .diagnostics()
            .iter()
            .map(|diag| Reportable::Diagnostic(DiagnosticAdapter::new(diag, src)))
            .collect(),
        _ => vec![Reportable::Error(ErrorAdapter(err))],
    }
}

#[cfg(test)]
mod tests {
    use polyglot::directive::RegistryError;
    use polyglot_parser::error::{ErrorCode, ParseError};

    use super::*;

    #[test]
    fn test_each_diagnostic_is_reported() {
        let diags = vec![
            Diagnostic::error("unrecognized directive `#!nope`")
                .with_code(ErrorCode::E100)
                .with_label(Span::new(0..6), "not a kernel or action"),
            Diagnostic::warning("something odd")
                .with_label(Span::new(7..9), "here")
                .with_help("look again"),
        ];
        let err = PolyglotError::new_parse_error(ParseError::from(diags), "#!nope\nxx\n");

        let reportables = to_reportables(&err);

        assert_eq!(reportables.len(), 2);
        assert_eq!(reportables[0].to_string(), "unrecognized directive `#!nope`");
        assert_eq!(
            reportables[0].code().map(|code| code.to_string()),
            Some("E100".to_string())
        );
        assert_eq!(reportables[1].severity(), Some(miette::Severity::Warning));
        assert_eq!(
            reportables[1].help().map(|help| help.to_string()),
            Some("look again".to_string())
        );
    }

    #[test]
    fn test_labels_keep_primary_flag() {
        let diag = Diagnostic::error("unknown option `--x`")
            .with_label(Span::new(0..12), "in this directive")
            .with_secondary_label(Span::new(9..12), "unknown option");

        let adapter = DiagnosticAdapter::new(&diag, "#!csharp --x");
        let labels: Vec<_> = adapter.labels().unwrap().collect();

        assert_eq!(labels.len(), 2);
        assert!(labels[0].primary());
        assert_eq!(labels[0].len(), 12);
        assert!(!labels[1].primary());
        assert_eq!(labels[1].offset(), 9);
    }

    #[test]
    fn test_non_parse_errors() {
        let err = PolyglotError::UnknownKernel("cobol".to_string());
        let reportables = to_reportables(&err);

        assert_eq!(reportables.len(), 1);
        assert_eq!(reportables[0].to_string(), "unknown kernel `cobol`");
        assert_eq!(
            reportables[0].code().map(|code| code.to_string()),
            Some("polyglot::kernel".to_string())
        );

        let err = PolyglotError::from(RegistryError::DuplicateKernel("csharp".to_string()));
        let reportables = to_reportables(&err);
        assert_eq!(
            reportables[0].code().map(|code| code.to_string()),
            Some("polyglot::config".to_string())
        );
        assert!(reportables[0].help().is_some());
    }
}
