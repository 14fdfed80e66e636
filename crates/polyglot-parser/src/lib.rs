//! # Polyglot Parser
//!
//! Lossless parser for documents that mix code for several kernels with
//! directive lines. The result is a [`SyntaxTree`]: a flat arena of nodes whose
//! spans tile the input exactly, so the original text can always be
//! reconstructed and any offset mapped back to a node and a kernel.
//!
//! Parsing is infallible. Unrecognized directives, unknown options and
//! malformed arguments are recorded as [`error::Diagnostic`]s on the offending
//! node and on the tree; use [`SyntaxTree::check`] to turn them into an error.
//!
//! ## Usage
//!
//! ```
//! use polyglot_core::directive::{DirectiveRegistry, KernelSpec};
//! use polyglot_parser::{parse, NodeKind};
//!
//! let registry = DirectiveRegistry::builder("csharp")
//!     .kernel(KernelSpec::local("csharp"))
//!     .kernel(KernelSpec::local("fsharp"))
//!     .build()
//!     .unwrap();
//!
//! let tree = parse("var x = 1;\n#!fsharp\nlet y = 2\n", &registry);
//!
//! assert!(tree.diagnostics().is_empty());
//! assert_eq!(tree.to_original_text(), tree.source());
//! assert_eq!(tree.kernel_at(0).unwrap(), "csharp");
//! assert_eq!(tree.kernel_at(22).unwrap(), "fsharp");
//! assert!(matches!(
//!     tree.node(tree.children(tree.root())[1]).kind(),
//!     NodeKind::KernelNameDirective(_)
//! ));
//! ```

mod builder;
pub mod error;
mod lexer;
mod options;
#[cfg(test)]
mod parser_tests;
mod query;
mod span;
mod tree;

pub use lexer::{DirectiveHead, Line, LineScanner, scan_lines};
pub use options::{DirectiveOptions, OptionValue};
pub use span::{Span, Spanned};
pub use tree::{
    ActionDirective, Directive, GenericDirective, InvariantViolation, KernelSelector, Node,
    NodeId, NodeKind, SyntaxTree,
};

use log::trace;

use polyglot_core::{directive::DirectiveRegistry, identifier::Id};

use builder::TreeBuilder;

/// Parse a submission using the registry's default kernel.
pub fn parse(source: &str, registry: &DirectiveRegistry) -> SyntaxTree {
    parse_with_default_kernel(source, registry, registry.default_kernel())
}

/// Parse a submission, treating text before the first selector as
/// `default_kernel` code.
///
/// The default kernel does not have to be registered; if it is not, no
/// action resolves until the first selector. A proxy default starts the
/// document inside an opaque proxy region, so directive lines are code for
/// the proxy until a local kernel is selected.
pub fn parse_with_default_kernel(
    source: &str,
    registry: &DirectiveRegistry,
    default_kernel: Id,
) -> SyntaxTree {
    trace!(
        bytes = source.len(),
        default_kernel = default_kernel.to_name();
        "Parsing submission"
    );

    let mut builder = TreeBuilder::new(registry, default_kernel);
    for line in scan_lines(source) {
        builder.push_line(&line);
    }
    builder.finish(source)
}
