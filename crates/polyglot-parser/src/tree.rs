//! The lossless submission tree.
//!
//! Nodes live in a flat arena owned by [`SyntaxTree`] and refer to each other
//! through [`NodeId`]s, so parent links need neither `Rc` nor lifetimes. The
//! root is always the [`NodeKind::Submission`] node at index 0.
//!
//! Every node carries two spans. `span` is the node's content, excluding the
//! final line terminator for directive nodes; `full_span` includes it. The
//! `full_span`s of the root's children tile the document with no gaps or
//! overlaps, so concatenating their text reproduces the input byte for byte.

use std::fmt::Write as _;

use thiserror::Error;

use polyglot_core::identifier::Id;

use crate::{
    error::{Diagnostic, DiagnosticCollector, ParseError},
    options::DirectiveOptions,
    span::{Span, Spanned},
};

/// Index of a node in its tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// The name, options and diagnostics shared by every recognized directive.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    name: Spanned<String>,
    options: DirectiveOptions,
    diagnostics: Vec<Diagnostic>,
}

impl Directive {
    pub(crate) fn new(
        name: Spanned<String>,
        options: DirectiveOptions,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        Self {
            name,
            options,
            diagnostics,
        }
    }

    /// The directive name as written, marker included (`#!csharp`, `#r`).
    pub fn name(&self) -> &Spanned<String> {
        &self.name
    }

    pub fn options(&self) -> &DirectiveOptions {
        &self.options
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|diag| diag.severity().is_error())
    }
}

/// A directive that switches the active kernel.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelSelector {
    kernel: Id,
    directive: Directive,
}

impl KernelSelector {
    pub(crate) fn new(kernel: Id, directive: Directive) -> Self {
        Self { kernel, directive }
    }

    /// The canonical name of the selected kernel, whichever alias was written.
    pub fn kernel(&self) -> Id {
        self.kernel
    }

    pub fn directive(&self) -> &Directive {
        &self.directive
    }
}

/// A directive executed by a kernel rather than switching to one.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionDirective {
    parent_kernel: Id,
    directive: Directive,
}

impl ActionDirective {
    pub(crate) fn new(parent_kernel: Id, directive: Directive) -> Self {
        Self {
            parent_kernel,
            directive,
        }
    }

    /// The kernel that was active when the action appeared.
    pub fn parent_kernel(&self) -> Id {
        self.parent_kernel
    }

    pub fn directive(&self) -> &Directive {
        &self.directive
    }
}

/// A control-marker line that names nothing the registry knows.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericDirective {
    kernel: Id,
    raw: String,
    diagnostics: Vec<Diagnostic>,
}

impl GenericDirective {
    pub(crate) fn new(kernel: Id, raw: String, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            kernel,
            raw,
            diagnostics,
        }
    }

    /// The kernel active when the line appeared.
    pub fn kernel(&self) -> Id {
        self.kernel
    }

    /// The line exactly as written, without its terminator.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// The root; spans the whole document.
    Submission,
    /// A run of consecutive non-directive lines for one kernel.
    Language { kernel: Id },
    KernelNameDirective(KernelSelector),
    ProxyKernelNameDirective(KernelSelector),
    ActionDirective(ActionDirective),
    GenericDirective(GenericDirective),
}

impl NodeKind {
    pub fn is_directive(&self) -> bool {
        !matches!(self, NodeKind::Submission | NodeKind::Language { .. })
    }

    /// The selector carried by a (proxy) kernel name directive.
    pub fn kernel_selector(&self) -> Option<&KernelSelector> {
        match self {
            NodeKind::KernelNameDirective(selector)
            | NodeKind::ProxyKernelNameDirective(selector) => Some(selector),
            _ => None,
        }
    }

    /// Diagnostics attached directly to this node.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            NodeKind::Submission | NodeKind::Language { .. } => &[],
            NodeKind::KernelNameDirective(selector)
            | NodeKind::ProxyKernelNameDirective(selector) => selector.directive().diagnostics(),
            NodeKind::ActionDirective(action) => action.directive().diagnostics(),
            NodeKind::GenericDirective(generic) => generic.diagnostics(),
        }
    }

    fn label(&self) -> String {
        match self {
            NodeKind::Submission => "Submission".to_string(),
            NodeKind::Language { kernel } => format!("Language({kernel})"),
            NodeKind::KernelNameDirective(selector) => {
                format!("KernelName({})", selector.kernel())
            }
            NodeKind::ProxyKernelNameDirective(selector) => {
                format!("ProxyKernelName({})", selector.kernel())
            }
            NodeKind::ActionDirective(action) => format!(
                "Action({} in {})",
                action.directive().name().inner(),
                action.parent_kernel()
            ),
            NodeKind::GenericDirective(generic) => format!("Generic(in {})", generic.kernel()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) span: Span,
    pub(crate) full_span: Span,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl Node {
    pub(crate) fn new(kind: NodeKind, span: Span, full_span: Span, parent: Option<NodeId>) -> Self {
        Self {
            kind,
            span,
            full_span,
            parent,
            children: Vec::new(),
        }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// The node's content span; for directives, the line without its terminator.
    pub fn span(&self) -> Span {
        self.span
    }

    /// The span including any trailing line terminator.
    pub fn full_span(&self) -> Span {
        self.full_span
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// A structural invariant the tree failed to uphold.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("root spans {actual} but the document spans {expected}")]
    RootCoverage { expected: Span, actual: Span },

    #[error("node {node:?} at {span} is not contained in its parent at {parent_span}")]
    Containment {
        node: NodeId,
        span: Span,
        parent_span: Span,
    },

    #[error("node {node:?} at {span} does not start where its previous sibling ended ({expected})")]
    Gap {
        node: NodeId,
        span: Span,
        expected: usize,
    },

    #[error("children of node {node:?} end at {actual} but the node ends at {expected}")]
    Hull {
        node: NodeId,
        expected: usize,
        actual: usize,
    },

    #[error("node {node:?} has content span {span} outside its full span {full_span}")]
    ContentSpan {
        node: NodeId,
        span: Span,
        full_span: Span,
    },

    #[error("node {node:?} lists parent {parent:?}, which does not list it as a child")]
    ParentLink { node: NodeId, parent: NodeId },
}

/// The parsed form of one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxTree {
    pub(crate) source: String,
    pub(crate) nodes: Vec<Node>,
    pub(crate) default_kernel: Id,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

impl SyntaxTree {
    /// The document the tree was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// The kernel in effect before the first selector.
    pub fn default_kernel(&self) -> Id {
        self.default_kernel
    }

    /// # Panics
    ///
    /// Panics if `id` belongs to another tree and is out of range.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// A tree always holds at least its root, so this is never `true`.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes with their ids, in arena order. The root comes first.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (NodeId(index), node))
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Ancestors from the parent up to the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&current| self.parent(current))
    }

    /// Every node below `id` in document order (pre-order), excluding `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev());
        }
        out
    }

    /// Source text under the node's content span.
    pub fn text(&self, id: NodeId) -> &str {
        &self.source[self.node(id).span.range()]
    }

    /// Source text under the node's full span.
    pub fn full_text(&self, id: NodeId) -> &str {
        &self.source[self.node(id).full_span.range()]
    }

    /// Every diagnostic produced while parsing, in document order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|diag| diag.severity().is_error())
    }

    /// Converts the diagnostic list into a result.
    ///
    /// # Errors
    ///
    /// Returns every diagnostic as a [`ParseError`] if any of them is an error.
    pub fn check(&self) -> Result<(), ParseError> {
        DiagnosticCollector::from_diagnostics(self.diagnostics.iter().cloned()).finish()
    }

    /// Checks coverage, containment, ordering and parent links.
    ///
    /// The builder asserts this in debug builds after every parse.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn verify_invariants(&self) -> Result<(), InvariantViolation> {
        let root = self.node(self.root());
        let document = Span::new(0..self.source.len());
        if root.full_span != document {
            return Err(InvariantViolation::RootCoverage {
                expected: document,
                actual: root.full_span,
            });
        }

        for (index, node) in self.nodes.iter().enumerate() {
            let id = NodeId::new(index);

            if !node.full_span.contains_span(node.span) {
                return Err(InvariantViolation::ContentSpan {
                    node: id,
                    span: node.span,
                    full_span: node.full_span,
                });
            }

            if let Some(parent) = node.parent {
                let parent_node = self.node(parent);
                if !parent_node.children.contains(&id) {
                    return Err(InvariantViolation::ParentLink { node: id, parent });
                }
                if !parent_node.full_span.contains_span(node.full_span) {
                    return Err(InvariantViolation::Containment {
                        node: id,
                        span: node.full_span,
                        parent_span: parent_node.full_span,
                    });
                }
            }

            if node.children.is_empty() {
                continue;
            }

            let mut expected = node.full_span.start();
            for &child in &node.children {
                let child_span = self.node(child).full_span;
                if child_span.start() != expected {
                    return Err(InvariantViolation::Gap {
                        node: child,
                        span: child_span,
                        expected,
                    });
                }
                expected = child_span.end();
            }
            if expected != node.full_span.end() {
                return Err(InvariantViolation::Hull {
                    node: id,
                    expected: node.full_span.end(),
                    actual: expected,
                });
            }
        }

        Ok(())
    }

    /// Indented one-line-per-node rendering, for debugging and the CLI.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_node(self.root(), 0, &mut out);
        out
    }

    fn dump_node(&self, id: NodeId, depth: usize, out: &mut String) {
        let node = self.node(id);
        let _ = write!(
            out,
            "{:indent$}{} {}",
            "",
            node.kind.label(),
            node.full_span,
            indent = depth * 2
        );
        if node.kind != NodeKind::Submission {
            let _ = write!(out, " {:?}", self.text(id));
        }
        out.push('\n');
        for &child in &node.children {
            self.dump_node(child, depth + 1, out);
        }
    }
}
