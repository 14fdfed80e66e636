//! Polyglot - split documents that mix several kernels into ordered work.
//!
//! A submission interleaves code for different kernels with directive lines
//! that switch kernels (`#!fsharp`) or run actions (`#!time`, `#r`). This
//! crate ties the pieces together: [`config::AppConfig`] describes the
//! kernels, [`SubmissionBuilder`] parses and splits a submission, the
//! [`dispatch`] module executes the result in order, and [`remap`] moves
//! backend diagnostics back onto the submission's buffers.

pub mod config;
pub mod dispatch;
pub mod remap;
pub mod split;

mod error;

pub use polyglot_core::{directive, identifier, schema};
pub use polyglot_parser::{NodeId, NodeKind, Span, SyntaxTree, error as diagnostics};

pub use error::PolyglotError;
pub use split::{Split, SubSubmission, SubmissionKind};

use log::{debug, info, trace};

use polyglot_core::directive::DirectiveRegistry;

use config::AppConfig;

/// Builder for parsing and splitting polyglot submissions.
///
/// # Examples
///
/// ```
/// use polyglot::{SubmissionBuilder, config::AppConfig};
///
/// let builder = SubmissionBuilder::new(AppConfig::default());
/// let split = builder
///     .split("var x = 1;\n#!fsharp\nlet y = x\n", None)
///     .expect("Failed to split");
/// let items = split.items();
///
/// assert!(split.diagnostics().is_empty());
/// assert_eq!(items.len(), 2);
/// assert_eq!(items[1].target(), "fsharp");
/// assert_eq!(items[1].code(), "let y = x\n");
/// ```
#[derive(Debug, Default)]
pub struct SubmissionBuilder {
    config: AppConfig,
}

impl SubmissionBuilder {
    /// Create a new submission builder with the given configuration.
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Build the directive registry described by the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PolyglotError::Registry`] if the configuration declares
    /// colliding or malformed kernels or actions.
    pub fn registry(&self) -> Result<DirectiveRegistry, PolyglotError> {
        Ok(self.config.registry()?)
    }

    /// Parse a submission into a syntax tree.
    ///
    /// Problems inside the document are reported as diagnostics on the tree,
    /// not as errors; see [`SubmissionBuilder::check`].
    ///
    /// # Errors
    ///
    /// Returns [`PolyglotError::Registry`] for an invalid configuration.
    pub fn parse(&self, source: &str) -> Result<SyntaxTree, PolyglotError> {
        info!("Parsing submission");

        let registry = self.registry()?;
        let tree = polyglot_parser::parse(source, &registry);

        debug!(
            nodes = tree.len(),
            diagnostics = tree.diagnostics().len();
            "Submission parsed"
        );
        trace!(tree = tree.dump(); "Parsed tree");

        Ok(tree)
    }

    /// Parse a submission and fail if it has any error diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`PolyglotError::Parse`] carrying every diagnostic and the
    /// source, or [`PolyglotError::Registry`] for an invalid configuration.
    pub fn check(&self, source: &str) -> Result<SyntaxTree, PolyglotError> {
        let tree = self.parse(source)?;
        tree.check()
            .map_err(|err| PolyglotError::new_parse_error(err, source))?;
        Ok(tree)
    }

    /// Parse and split a submission into ordered sub-submissions.
    ///
    /// `target` names the kernel the submission was sent to; `None` uses the
    /// configured default. Directive errors do not fail the split; they show
    /// up as [`SubmissionKind::Failed`] items, and the diagnostics of the
    /// parse that was split are returned alongside through
    /// [`Split::diagnostics`].
    ///
    /// # Errors
    ///
    /// Returns [`PolyglotError::UnknownKernel`] if `target` is not a
    /// configured kernel, or [`PolyglotError::Registry`] for an invalid
    /// configuration.
    pub fn split(
        &self,
        source: &str,
        target: Option<&str>,
    ) -> Result<Split, PolyglotError> {
        info!(
            kernel = target.unwrap_or(self.config.default_kernel());
            "Splitting submission"
        );

        let tree = self.parse(source)?;
        self.split_tree(&tree, target)
    }

    /// Split an already parsed tree.
    ///
    /// # Errors
    ///
    /// Same as [`SubmissionBuilder::split`].
    pub fn split_tree(
        &self,
        tree: &SyntaxTree,
        target: Option<&str>,
    ) -> Result<Split, PolyglotError> {
        let registry = self.registry()?;
        let split = split::split(tree, &registry, target)?;

        debug!(
            items = split.items().len(),
            diagnostics = split.diagnostics().len();
            "Submission split"
        );

        Ok(split)
    }
}
