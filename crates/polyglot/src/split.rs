//! Splitting a parsed submission into per-kernel work items.
//!
//! [`split`] walks the top level of a [`SyntaxTree`] in document order and
//! produces the ordered list of [`SubSubmission`]s a dispatcher executes one
//! after another. Routing problems never abort the split: a directive with
//! errors becomes a [`SubmissionKind::Failed`] item in its place, so every
//! item around it keeps its position.

use std::borrow::Cow;

use log::debug;

use polyglot_core::{directive::DirectiveRegistry, identifier::Id};
use polyglot_parser::{
    DirectiveOptions, NodeId, NodeKind, Span, SyntaxTree,
    error::{Diagnostic, ParseError},
    parse_with_default_kernel,
};

use crate::error::PolyglotError;

/// What a [`SubSubmission`] asks its kernel to do.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionKind {
    /// Source code to compile and run.
    Code,
    /// An action directive such as `#!time` or `#r`.
    Action {
        name: String,
        options: DirectiveOptions,
    },
    /// A directive that cannot be executed; carries the reasons.
    Failed { diagnostics: Vec<Diagnostic> },
}

/// One unit of work for one kernel.
#[derive(Debug, Clone, PartialEq)]
pub struct SubSubmission {
    target: Id,
    code: String,
    span: Span,
    kind: SubmissionKind,
}

impl SubSubmission {
    /// The kernel that executes this item.
    pub fn target(&self) -> Id {
        self.target
    }

    /// The text sent to the kernel, verbatim from the document.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Where the text came from in the document.
    pub fn span(&self) -> Span {
        self.span
    }

    pub fn kind(&self) -> &SubmissionKind {
        &self.kind
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.kind, SubmissionKind::Failed { .. })
    }

    /// Diagnostics of a failed item; empty otherwise.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match &self.kind {
            SubmissionKind::Failed { diagnostics } => diagnostics,
            _ => &[],
        }
    }
}

/// The ordered items of one split, together with the diagnostics of the parse
/// they were taken from.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    items: Vec<SubSubmission>,
    diagnostics: Vec<Diagnostic>,
}

impl Split {
    pub fn items(&self) -> &[SubSubmission] {
        &self.items
    }

    pub fn into_items(self) -> Vec<SubSubmission> {
        self.items
    }

    /// Diagnostics of the tree that was split.
    ///
    /// Empty when the submission was forwarded to a proxy kernel, since its
    /// text was never interpreted.
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
        if self.has_errors() {
            return Err(ParseError::new(self.diagnostics.clone()));
        }
        Ok(())
    }
}

/// Splits `tree` into ordered sub-submissions.
///
/// `target` overrides the kernel for text before the first selector. When it
/// names a proxy kernel the tree is not interpreted at all: the whole source
/// is forwarded as a single item. When it names a local kernel other than the
/// tree's default, the source is reparsed with that default so that actions
/// resolve against the right kernel, and the returned diagnostics are the
/// reparse's.
///
/// Code runs for the same kernel separated only by selectors that do not
/// change the kernel are merged into one item.
///
/// # Errors
///
/// Returns [`PolyglotError::UnknownKernel`] if `target` is not registered.
pub fn split(
    tree: &SyntaxTree,
    registry: &DirectiveRegistry,
    target: Option<&str>,
) -> Result<Split, PolyglotError> {
    let tree = match target {
        None => Cow::Borrowed(tree),
        Some(name) => {
            let kernel = registry
                .kernel_by_name(name)
                .ok_or_else(|| PolyglotError::UnknownKernel(name.to_string()))?;

            if kernel.is_proxy() {
                debug!(kernel = kernel.name().to_name(); "Forwarding whole submission to proxy");
                return Ok(Split {
                    items: vec![SubSubmission {
                        target: kernel.name(),
                        code: tree.source().to_string(),
                        span: Span::new(0..tree.source().len()),
                        kind: SubmissionKind::Code,
                    }],
                    diagnostics: Vec::new(),
                });
            }

            if kernel.name() == tree.default_kernel() {
                Cow::Borrowed(tree)
            } else {
                Cow::Owned(parse_with_default_kernel(
                    tree.source(),
                    registry,
                    kernel.name(),
                ))
            }
        }
    };

    let mut items: Vec<SubSubmission> = Vec::new();
    // Index of the code item later runs of the same kernel may still extend.
    let mut open_code: Option<usize> = None;

    for &id in tree.children(tree.root()) {
        let node = tree.node(id);

        if let (NodeKind::Language { kernel }, Some(index)) = (node.kind(), open_code) {
            let item = &mut items[index];
            if item.target == *kernel {
                item.code.push_str(tree.full_text(id));
                item.span = item.span.union(node.full_span());
                continue;
            }
        }

        match sub_submission(&tree, id) {
            Some(item) => {
                open_code = matches!(item.kind, SubmissionKind::Code).then_some(items.len());
                items.push(item);
            }
            None => {
                if let NodeKind::KernelNameDirective(selector)
                | NodeKind::ProxyKernelNameDirective(selector) = node.kind()
                {
                    let unchanged = open_code
                        .is_some_and(|index| items[index].target == selector.kernel());
                    if !unchanged {
                        open_code = None;
                    }
                }
            }
        }
    }

    debug!(
        items = items.len(),
        failed = items.iter().filter(|item| item.is_failed()).count();
        "Split submission"
    );

    Ok(Split {
        items,
        diagnostics: tree.diagnostics().to_vec(),
    })
}

fn sub_submission(tree: &SyntaxTree, id: NodeId) -> Option<SubSubmission> {
    let node = tree.node(id);
    let failed = |target: Id, diagnostics: &[Diagnostic]| SubSubmission {
        target,
        code: tree.text(id).to_string(),
        span: node.span(),
        kind: SubmissionKind::Failed {
            diagnostics: diagnostics.to_vec(),
        },
    };

    match node.kind() {
        NodeKind::Submission => None,
        NodeKind::Language { kernel } => {
            let code = tree.full_text(id);
            if code.trim().is_empty() {
                return None;
            }
            Some(SubSubmission {
                target: *kernel,
                code: code.to_string(),
                span: node.full_span(),
                kind: SubmissionKind::Code,
            })
        }
        NodeKind::KernelNameDirective(selector) | NodeKind::ProxyKernelNameDirective(selector) => {
            let directive = selector.directive();
            directive
                .has_errors()
                .then(|| failed(selector.kernel(), directive.diagnostics()))
        }
        NodeKind::ActionDirective(action) => {
            let directive = action.directive();
            if directive.has_errors() {
                return Some(failed(action.parent_kernel(), directive.diagnostics()));
            }
            Some(SubSubmission {
                target: action.parent_kernel(),
                code: tree.text(id).to_string(),
                span: node.span(),
                kind: SubmissionKind::Action {
                    name: directive.name().inner().clone(),
                    options: directive.options().clone(),
                },
            })
        }
        NodeKind::GenericDirective(generic) => {
            Some(failed(generic.kernel(), generic.diagnostics()))
        }
    }
}

#[cfg(test)]
mod tests {
    use polyglot_core::directive::{ActionSpec, KernelSpec};
    use polyglot_parser::{error::ErrorCode, parse};

    use super::*;

    fn registry() -> DirectiveRegistry {
        DirectiveRegistry::builder("csharp")
            .kernel(KernelSpec::local("csharp").with_action(ActionSpec::new("#r")))
            .kernel(KernelSpec::local("fsharp"))
            .kernel(KernelSpec::proxy("proxyKernel"))
            .shared_action(ActionSpec::new("#!time"))
            .build()
            .expect("test registry is valid")
    }

    fn summary(items: &[SubSubmission]) -> Vec<(String, &str)> {
        items
            .iter()
            .map(|item| {
                let tag = match item.kind() {
                    SubmissionKind::Code => format!("code:{}", item.target()),
                    SubmissionKind::Action { name, .. } => format!("{name}:{}", item.target()),
                    SubmissionKind::Failed { .. } => format!("failed:{}", item.target()),
                };
                (tag, item.code())
            })
            .collect()
    }

    #[test]
    fn test_split_by_kernel_and_action() {
        let registry = registry();
        let tree = parse("var x = 1;\n#!time\nx\n#!fsharp\nlet y = 2\n", &registry);
        let items = split(&tree, &registry, None).unwrap().into_items();

        assert_eq!(
            summary(&items),
            vec![
                ("code:csharp".to_string(), "var x = 1;\n"),
                ("#!time:csharp".to_string(), "#!time"),
                ("code:csharp".to_string(), "x\n"),
                ("code:fsharp".to_string(), "let y = 2\n"),
            ]
        );
        assert_eq!(items[3].span(), Span::new(28..38));
    }

    #[test]
    fn test_whole_submission_to_proxy_is_not_interpreted() {
        let registry = registry();
        let body = "#!time\nvar a = 1;\n#!time\nvar b = 2;\n";
        let tree = parse(body, &registry);
        let items = split(&tree, &registry, Some("proxyKernel")).unwrap().into_items();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].target(), Id::new("proxyKernel"));
        assert_eq!(items[0].code(), body);
        assert_eq!(items[0].kind(), &SubmissionKind::Code);
    }

    #[test]
    fn test_proxy_region_then_local_kernel() {
        let registry = registry();
        let source = "#!proxyKernel\n#!time\nvar a = 1;\n#!time\nvar b = 2;\n#!csharp\nvar d = 12;\n#!time\nConsole.WriteLine(d);\n";
        let tree = parse(source, &registry);
        let items = split(&tree, &registry, None).unwrap().into_items();

        assert_eq!(
            summary(&items),
            vec![
                (
                    "code:proxyKernel".to_string(),
                    "#!time\nvar a = 1;\n#!time\nvar b = 2;\n"
                ),
                ("code:csharp".to_string(), "var d = 12;\n"),
                ("#!time:csharp".to_string(), "#!time"),
                ("code:csharp".to_string(), "Console.WriteLine(d);\n"),
            ]
        );
    }

    #[test]
    fn test_failed_directives_keep_their_place() {
        let registry = registry();
        let tree = parse("a\n#!nope\nb\n#!fsharp --bad\nc\n", &registry);
        let items = split(&tree, &registry, None).unwrap().into_items();

        assert_eq!(
            summary(&items),
            vec![
                ("code:csharp".to_string(), "a\n"),
                ("failed:csharp".to_string(), "#!nope"),
                ("code:csharp".to_string(), "b\n"),
                ("failed:fsharp".to_string(), "#!fsharp --bad"),
                ("code:fsharp".to_string(), "c\n"),
            ]
        );
        assert_eq!(items[1].diagnostics()[0].code(), Some(ErrorCode::E100));
        assert_eq!(items[3].diagnostics()[0].code(), Some(ErrorCode::E200));
    }

    #[test]
    fn test_blank_runs_are_skipped() {
        let registry = registry();
        let tree = parse("#!fsharp\n\n  \n#!time\n", &registry);
        let items = split(&tree, &registry, None).unwrap().into_items();

        assert_eq!(summary(&items), vec![("#!time:fsharp".to_string(), "#!time")]);
    }

    #[test]
    fn test_local_target_reparses_with_new_default() {
        let registry = registry();
        let tree = parse("#r \"a.dll\"\nlet x = 1\n", &registry);
        let items = split(&tree, &registry, Some("fsharp")).unwrap().into_items();

        // `#r` is not an fsharp action, so the whole text is fsharp code.
        assert_eq!(
            summary(&items),
            vec![("code:fsharp".to_string(), "#r \"a.dll\"\nlet x = 1\n")]
        );
    }

    #[test]
    fn test_runs_across_unchanged_selector_are_merged() {
        let registry = registry();
        let source = "var a = 1;\n#!csharp\nvar b = 2;\n";
        let items = split(&parse(source, &registry), &registry, None)
            .unwrap()
            .into_items();

        assert_eq!(
            summary(&items),
            vec![("code:csharp".to_string(), "var a = 1;\nvar b = 2;\n")]
        );
        assert_eq!(items[0].span(), Span::new(0..source.len()));
    }

    #[test]
    fn test_runs_across_kernel_switch_stay_apart() {
        let registry = registry();
        let source = "a\n#!fsharp\n#!csharp\nb\n#!time\n#!csharp\nc\n";
        let items = split(&parse(source, &registry), &registry, None)
            .unwrap()
            .into_items();

        assert_eq!(
            summary(&items),
            vec![
                ("code:csharp".to_string(), "a\n"),
                ("code:csharp".to_string(), "b\n"),
                ("#!time:csharp".to_string(), "#!time"),
                ("code:csharp".to_string(), "c\n"),
            ]
        );
    }

    #[test]
    fn test_diagnostics_follow_the_split_tree() {
        let registry = registry();
        let tree = parse("#r --bad\nlet x = 1\n", &registry);
        assert!(tree.has_errors());

        let default = split(&tree, &registry, None).unwrap();
        assert!(default.check().is_err());
        assert_eq!(default.diagnostics()[0].code(), Some(ErrorCode::E200));

        // Under fsharp `#r` is plain code.
        let fsharp = split(&tree, &registry, Some("fsharp")).unwrap();
        assert!(fsharp.diagnostics().is_empty());
        assert!(fsharp.check().is_ok());
    }

    #[test]
    fn test_proxy_target_has_no_diagnostics() {
        let registry = registry();
        let tree = parse("#!nope\nx = 1\n", &registry);
        assert!(tree.has_errors());

        let forwarded = split(&tree, &registry, Some("proxyKernel")).unwrap();
        assert!(forwarded.diagnostics().is_empty());
        assert!(!forwarded.has_errors());
        assert_eq!(forwarded.items().len(), 1);
    }

    #[test]
    fn test_unknown_target() {
        let registry = registry();
        let tree = parse("x", &registry);

        assert!(matches!(
            split(&tree, &registry, Some("cobol")),
            Err(PolyglotError::UnknownKernel(name)) if name == "cobol"
        ));
    }

    #[test]
    fn test_split_is_deterministic() {
        let registry = registry();
        let source = "a\n#!time\n#!nope\n#!proxyKernel\n#!time\n#!fsharp\nb\n";

        let first = split(&parse(source, &registry), &registry, None).unwrap();
        let second = split(&parse(source, &registry), &registry, None).unwrap();
        assert_eq!(first, second);
    }
}
