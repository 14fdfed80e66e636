//! Error and diagnostic system for the polyglot parser.
//!
//! Parsing never fails outright: every problem found while building the tree
//! becomes a [`Diagnostic`] attached both to the offending node and to the
//! tree's flat diagnostic list. Callers that want a hard failure turn the list
//! into a [`ParseError`] through [`SyntaxTree::check`](crate::SyntaxTree::check).
//!
//! Error codes are grouped by phase:
//! - `E0xx` - directive line tokenizing
//! - `E1xx` - directive resolution
//! - `E2xx` - directive option parsing
//!
//! # Example
//!
//! ```
//! # use polyglot_parser::error::{Diagnostic, ErrorCode};
//! # use polyglot_parser::Span;
//!
//! let line = Span::new(0..24);
//! let token = Span::new(9..24);
//!
//! let diag = Diagnostic::error("unknown option `--invalid-option` for `#!csharp`")
//!     .with_code(ErrorCode::E200)
//!     .with_label(line, "in this directive")
//!     .with_secondary_label(token, "unknown option");
//!
//! assert_eq!(diag.primary_span(), Some(line));
//! ```

mod collector;
mod diagnostic;
mod error_code;
mod label;
mod parse_error;
mod severity;

pub(crate) use collector::DiagnosticCollector;

pub use diagnostic::Diagnostic;
pub use error_code::ErrorCode;
pub use label::Label;
pub use parse_error::ParseError;
pub use severity::Severity;
