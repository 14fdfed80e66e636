//! Single-pass tree construction.
//!
//! [`TreeBuilder`] consumes the document line by line and appends nodes to
//! the root in document order. Its state is the active kernel, whether the
//! active kernel is a proxy (inside whose region directives are opaque text),
//! and the language run still open for coalescing.

use log::{debug, trace};

use polyglot_core::{
    directive::{ActionSpec, CONTROL_MARKER, DirectiveRegistry, KernelSpec, Resolution},
    identifier::Id,
    schema::OptionSchema,
};

use crate::{
    error::{Diagnostic, DiagnosticCollector, ErrorCode},
    lexer::{DirectiveHead, Line, tokenize_arguments},
    options::parse_options,
    span::{Span, Spanned},
    tree::{
        ActionDirective, Directive, GenericDirective, KernelSelector, Node, NodeId, NodeKind,
        SyntaxTree,
    },
};

pub(crate) struct TreeBuilder<'r> {
    registry: &'r DirectiveRegistry,
    nodes: Vec<Node>,
    diagnostics: DiagnosticCollector,
    default_kernel: Id,
    current_kernel: Id,
    in_proxy_region: bool,
    open_language: Option<NodeId>,
}

impl<'r> TreeBuilder<'r> {
    pub(crate) fn new(registry: &'r DirectiveRegistry, default_kernel: Id) -> Self {
        let root = Node::new(NodeKind::Submission, Span::default(), Span::default(), None);
        Self {
            registry,
            nodes: vec![root],
            diagnostics: DiagnosticCollector::new(),
            default_kernel,
            current_kernel: default_kernel,
            in_proxy_region: registry.is_proxy(default_kernel),
            open_language: None,
        }
    }

    pub(crate) fn push_line(&mut self, line: &Line<'_>) {
        let Some(head) = line.directive_head() else {
            self.push_language(line);
            return;
        };

        let resolution = self.registry.resolve(self.current_kernel, head.name);

        if self.in_proxy_region {
            // Only a switch back to a local kernel is visible inside a proxy region.
            match resolution {
                Resolution::KernelSelector(kernel) if !kernel.is_proxy() => {
                    self.push_selector(line, &head, kernel);
                }
                _ => self.push_language(line),
            }
            return;
        }

        match resolution {
            Resolution::KernelSelector(kernel) => self.push_selector(line, &head, kernel),
            Resolution::Action(action) => self.push_action(line, &head, action),
            Resolution::Unknown if head.name.starts_with(CONTROL_MARKER) => {
                self.push_generic(line, &head);
            }
            // `#`-only lines that name nothing are ordinary code (`#include`, `# comment`).
            Resolution::Unknown => self.push_language(line),
        }
    }

    pub(crate) fn finish(self, source: &str) -> SyntaxTree {
        let tree = SyntaxTree {
            source: source.to_owned(),
            nodes: self.nodes,
            default_kernel: self.default_kernel,
            diagnostics: self.diagnostics.into_diagnostics(),
        };

        debug!(
            nodes = tree.len(),
            diagnostics = tree.diagnostics().len();
            "Built submission tree"
        );

        debug_assert!(
            tree.verify_invariants().is_ok(),
            "tree invariant violated: {:?}",
            tree.verify_invariants()
        );

        tree
    }

    fn push_language(&mut self, line: &Line<'_>) {
        let span = line.full_span();

        if let Some(open) = self.open_language {
            let node = &mut self.nodes[open.index()];
            if matches!(node.kind, NodeKind::Language { kernel } if kernel == self.current_kernel) {
                node.span = node.span.union(span);
                node.full_span = node.full_span.union(span);
                self.grow_root(span);
                return;
            }
        }

        let id = self.append(
            NodeKind::Language {
                kernel: self.current_kernel,
            },
            span,
            span,
        );
        self.open_language = Some(id);
    }

    fn push_selector(&mut self, line: &Line<'_>, head: &DirectiveHead<'_>, kernel: &KernelSpec) {
        let directive = self.directive(line, head, kernel.selector_schema());

        trace!(
            from = self.current_kernel.to_name(),
            to = kernel.name().to_name(),
            proxy = kernel.is_proxy();
            "Kernel switch"
        );

        let selector = KernelSelector::new(kernel.name(), directive);
        let kind = if kernel.is_proxy() {
            NodeKind::ProxyKernelNameDirective(selector)
        } else {
            NodeKind::KernelNameDirective(selector)
        };
        self.append_directive(kind, line);

        self.current_kernel = kernel.name();
        self.in_proxy_region = kernel.is_proxy();
    }

    fn push_action(&mut self, line: &Line<'_>, head: &DirectiveHead<'_>, action: &ActionSpec) {
        let directive = self.directive(line, head, action.schema());
        let kind = NodeKind::ActionDirective(ActionDirective::new(self.current_kernel, directive));
        self.append_directive(kind, line);
    }

    fn push_generic(&mut self, line: &Line<'_>, head: &DirectiveHead<'_>) {
        let diagnostic = if head.name == CONTROL_MARKER {
            Diagnostic::error("unrecognized directive: missing name after `#!`")
                .with_code(ErrorCode::E101)
                .with_label(line.span(), "expected a kernel or action name")
                .with_help("write a kernel name such as `#!csharp`, or remove the line")
        } else {
            Diagnostic::error(format!("unrecognized directive `{}`", head.name))
                .with_code(ErrorCode::E100)
                .with_label(line.span(), "not a kernel or an action")
                .with_help(format!(
                    "`{}` is neither a known kernel nor an action available in `{}`",
                    head.name, self.current_kernel
                ))
        };

        self.diagnostics.emit(diagnostic.clone());
        let generic = GenericDirective::new(
            self.current_kernel,
            line.text().to_owned(),
            vec![diagnostic],
        );
        self.append_directive(NodeKind::GenericDirective(generic), line);
    }

    /// Tokenizes and option-parses a recognized directive line.
    fn directive(
        &mut self,
        line: &Line<'_>,
        head: &DirectiveHead<'_>,
        schema: &OptionSchema,
    ) -> Directive {
        let (tokens, lex_error) = tokenize_arguments(head.rest, head.rest_offset);
        let (options, option_diagnostics) =
            parse_options(schema, head.name, &tokens, line.span());

        let mut diagnostics = Vec::with_capacity(option_diagnostics.len() + 1);
        if let Some(error) = lex_error {
            let mut diagnostic = Diagnostic::error(error.message)
                .with_code(error.code)
                .with_label(line.span(), "in this directive")
                .with_secondary_label(error.span, error.code.description());
            if let Some(help) = error.help {
                diagnostic = diagnostic.with_help(help);
            }
            diagnostics.push(diagnostic);
        }
        diagnostics.extend(option_diagnostics);

        self.diagnostics.extend(diagnostics.iter().cloned());

        Directive::new(
            Spanned::new(head.name.to_owned(), head.name_span),
            options,
            diagnostics,
        )
    }

    fn append_directive(&mut self, kind: NodeKind, line: &Line<'_>) {
        self.append(kind, line.span(), line.full_span());
        self.open_language = None;
    }

    fn append(&mut self, kind: NodeKind, span: Span, full_span: Span) -> NodeId {
        let root = NodeId::new(0);
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(Node::new(kind, span, full_span, Some(root)));
        self.nodes[root.index()].children.push(id);
        self.grow_root(full_span);
        id
    }

    fn grow_root(&mut self, span: Span) {
        let root = &mut self.nodes[0];
        root.span = root.span.union(span);
        root.full_span = root.full_span.union(span);
    }
}
