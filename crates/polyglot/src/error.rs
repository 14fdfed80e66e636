//! Error types for polyglot operations.
//!
//! [`PolyglotError`] covers everything that stops a submission from being
//! split. Problems inside the document itself are not errors at this level:
//! they are diagnostics on the tree and `Failed` items in the split.

use std::io;

use thiserror::Error;

use polyglot_core::directive::RegistryError;
use polyglot_parser::error::ParseError;

/// The main error type for polyglot operations.
///
/// # Diagnostic Variants
///
/// The `Parse` variant keeps the submission text next to the diagnostics so
/// that a reporter can render labelled source snippets.
#[derive(Debug, Error)]
pub enum PolyglotError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{err}")]
    Parse { err: ParseError, src: String },

    #[error("invalid kernel configuration: {0}")]
    Registry(#[from] RegistryError),

    #[error("unknown kernel `{0}`")]
    UnknownKernel(String),
}

impl PolyglotError {
    /// Create a new `Parse` error with the associated source code.
    pub fn new_parse_error(err: ParseError, src: impl Into<String>) -> Self {
        Self::Parse {
            err,
            src: src.into(),
        }
    }
}
