//! Tree-building tests over whole documents.
//!
//! Scenario tests pin exact node layouts for representative submissions; the
//! property tests at the bottom check losslessness and span invariants over
//! generated documents.

use polyglot_core::{
    directive::{ActionSpec, DirectiveRegistry, KernelSpec},
    identifier::Id,
    schema::{OptionSchema, OptionSpec, PositionalSpec},
};

use crate::{
    NodeId, NodeKind, Span, SyntaxTree,
    error::{ErrorCode, Severity},
    parse, parse_with_default_kernel,
};

fn registry() -> DirectiveRegistry {
    let source = OptionSchema::new().with_positional(PositionalSpec::new("source").required());

    DirectiveRegistry::builder("csharp")
        .kernel(
            KernelSpec::local("csharp")
                .with_alias("c#")
                .with_action(ActionSpec::with_schema("#i", source.clone()))
                .with_action(ActionSpec::with_schema("#r", source)),
        )
        .kernel(KernelSpec::local("fsharp").with_alias("f#"))
        .kernel(KernelSpec::proxy("proxyKernel"))
        .kernel(KernelSpec::proxy("otherProxy"))
        .shared_action(ActionSpec::new("#!time"))
        .shared_action(ActionSpec::with_schema(
            "#!set",
            OptionSchema::new()
                .with_option(OptionSpec::value("--name").required())
                .with_option(OptionSpec::value("--value")),
        ))
        .build()
        .expect("test registry is valid")
}

fn top_level(tree: &SyntaxTree) -> Vec<NodeId> {
    tree.children(tree.root()).to_vec()
}

/// One short label per top-level node, for compact layout assertions.
fn layout(tree: &SyntaxTree) -> Vec<String> {
    top_level(tree)
        .into_iter()
        .map(|id| match tree.node(id).kind() {
            NodeKind::Submission => "submission".to_string(),
            NodeKind::Language { kernel } => format!("lang:{kernel}"),
            NodeKind::KernelNameDirective(selector) => format!("select:{}", selector.kernel()),
            NodeKind::ProxyKernelNameDirective(selector) => format!("proxy:{}", selector.kernel()),
            NodeKind::ActionDirective(action) => format!(
                "action:{}@{}",
                action.directive().name().inner(),
                action.parent_kernel()
            ),
            NodeKind::GenericDirective(_) => "generic".to_string(),
        })
        .collect()
}

fn directive_nodes(tree: &SyntaxTree) -> Vec<NodeId> {
    top_level(tree)
        .into_iter()
        .filter(|&id| tree.node(id).kind().is_directive())
        .collect()
}

fn assert_lossless(source: &str) -> SyntaxTree {
    let tree = parse(source, &registry());
    assert_eq!(tree.to_original_text(), source);
    assert_eq!(tree.verify_invariants(), Ok(()));
    tree
}

#[test]
fn test_selector_then_code_round_trips() {
    let source = "#!csharp \nvar x = 123;\nx\n";
    let tree = assert_lossless(source);

    assert_eq!(layout(&tree), vec!["select:csharp", "lang:csharp"]);

    let selector = top_level(&tree)[0];
    assert_eq!(tree.node(selector).span(), Span::new(0..9));
    assert_eq!(tree.node(selector).full_span(), Span::new(0..10));
    assert_eq!(tree.full_text(top_level(&tree)[1]), "var x = 123;\nx\n");
}

#[test]
fn test_hash_action_in_default_kernel() {
    let tree = assert_lossless("var x = 1;\n#i \"nuget:/some/path\"\nx");

    let directives = directive_nodes(&tree);
    assert_eq!(directives.len(), 1);
    assert_eq!(tree.text(directives[0]), "#i \"nuget:/some/path\"");
    assert_eq!(layout(&tree), vec!["lang:csharp", "action:#i@csharp", "lang:csharp"]);

    let NodeKind::ActionDirective(action) = tree.node(directives[0]).kind() else {
        panic!("expected an action directive");
    };
    assert_eq!(action.directive().options().positional("source"), Some("nuget:/some/path"));
    assert!(tree.diagnostics().is_empty());
}

#[test]
fn test_invalid_selector_option_is_reported_on_the_directive_span() {
    let tree = assert_lossless("#!csharp --invalid-option\nvar x = 1;");

    let directives = directive_nodes(&tree);
    assert_eq!(directives.len(), 1);

    let errors: Vec<_> = tree
        .diagnostics()
        .iter()
        .filter(|diag| diag.severity() == Severity::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code(), Some(ErrorCode::E200));
    assert_eq!(errors[0].primary_span(), Some(tree.node(directives[0]).span()));

    // The node carries the same diagnostic as the tree-level list.
    assert_eq!(tree.node(directives[0]).kind().diagnostics(), tree.diagnostics());
}

#[test]
fn test_unrecognized_directive_becomes_generic() {
    let tree = assert_lossless("x\n#!nope --flag\ny");

    assert_eq!(layout(&tree), vec!["lang:csharp", "generic", "lang:csharp"]);

    let generic = directive_nodes(&tree)[0];
    let NodeKind::GenericDirective(node) = tree.node(generic).kind() else {
        panic!("expected a generic directive");
    };
    assert_eq!(node.raw(), "#!nope --flag");
    assert_eq!(node.kernel(), Id::new("csharp"));

    assert_eq!(tree.diagnostics().len(), 1);
    let diag = &tree.diagnostics()[0];
    assert_eq!(diag.code(), Some(ErrorCode::E100));
    assert!(diag.message().starts_with("unrecognized directive"));
    assert_eq!(diag.primary_span(), Some(Span::new(2..15)));
}

#[test]
fn test_bare_marker_is_a_directive() {
    let tree = assert_lossless("#!\nx");

    assert_eq!(layout(&tree), vec!["generic", "lang:csharp"]);
    assert_eq!(tree.diagnostics()[0].code(), Some(ErrorCode::E101));
}

#[test]
fn test_marker_inside_line_stays_language() {
    let tree = assert_lossless("var s = \"#!fsharp\"; // ends with #!\nnext #!time\n");

    assert_eq!(layout(&tree), vec!["lang:csharp"]);
    assert!(tree.diagnostics().is_empty());
}

#[test]
fn test_unknown_hash_line_is_code() {
    let tree = assert_lossless("#!fsharp\n#if DEBUG\nprintfn \"x\"\n#endif\n");

    assert_eq!(layout(&tree), vec!["select:fsharp", "lang:fsharp"]);
}

#[test]
fn test_actions_resolve_against_active_kernel() {
    // `#r` belongs to csharp only; in fsharp it is plain text.
    let tree = assert_lossless("#r \"a.dll\"\n#!fsharp\n#r \"b.dll\"\n#!time\n");

    assert_eq!(
        layout(&tree),
        vec!["action:#r@csharp", "select:fsharp", "lang:fsharp", "action:#!time@fsharp"]
    );
}

#[test]
fn test_indented_directive() {
    let tree = assert_lossless("  #!fsharp\nlet x = 1");

    assert_eq!(layout(&tree), vec!["select:fsharp", "lang:fsharp"]);
    let selector = directive_nodes(&tree)[0];
    let NodeKind::KernelNameDirective(selector) = tree.node(selector).kind() else {
        panic!("expected a kernel selector");
    };
    assert_eq!(selector.directive().name().span(), Span::new(2..10));
}

#[test]
fn test_alias_selects_canonical_kernel() {
    let tree = assert_lossless("#!f#\nlet x = 1\n#!c#\nvar y = 2;");

    assert_eq!(
        layout(&tree),
        vec!["select:fsharp", "lang:fsharp", "select:csharp", "lang:csharp"]
    );
}

#[test]
fn test_language_runs_coalesce_until_a_directive() {
    let tree = assert_lossless("a\nb\n#!time\nc\nd\n");

    assert_eq!(
        layout(&tree),
        vec!["lang:csharp", "action:#!time@csharp", "lang:csharp"]
    );
    assert_eq!(tree.node(top_level(&tree)[0]).full_span(), Span::new(0..4));
    assert_eq!(tree.node(top_level(&tree)[2]).full_span(), Span::new(11..15));
}

#[test]
fn test_proxy_region_is_opaque_until_local_selector() {
    let source = "#!proxyKernel\n#!time\nvar a = 1;\n#!otherProxy\n#!nope\n#!fsharp\nlet b = 2\n";
    let tree = assert_lossless(source);

    assert_eq!(
        layout(&tree),
        vec!["proxy:proxyKernel", "lang:proxyKernel", "select:fsharp", "lang:fsharp"]
    );
    assert_eq!(
        tree.full_text(top_level(&tree)[1]),
        "#!time\nvar a = 1;\n#!otherProxy\n#!nope\n"
    );
    assert!(tree.diagnostics().is_empty());
}

#[test]
fn test_proxy_default_kernel_starts_opaque() {
    let registry = registry();
    let source = "#!time\nremote()\n#!otherProxy\n#!csharp\n#!time\n";
    let tree = parse_with_default_kernel(source, &registry, Id::new("proxyKernel"));

    assert_eq!(tree.to_original_text(), source);
    assert_eq!(
        layout(&tree),
        vec!["lang:proxyKernel", "select:csharp", "action:#!time@csharp"]
    );
    assert_eq!(
        tree.full_text(top_level(&tree)[0]),
        "#!time\nremote()\n#!otherProxy\n"
    );
    assert!(tree.diagnostics().is_empty());
}

#[test]
fn test_crlf_terminators() {
    let tree = assert_lossless("#!fsharp\r\nlet x = 1\r\n#!time\r\n");

    let nodes = top_level(&tree);
    assert_eq!(tree.node(nodes[0]).span(), Span::new(0..8));
    assert_eq!(tree.node(nodes[0]).full_span(), Span::new(0..10));
    assert_eq!(tree.text(nodes[2]), "#!time");
}

#[test]
fn test_action_option_errors() {
    let tree = assert_lossless("#!set --value 1\n#r \"unterminated\n");

    let codes: Vec<_> = tree.diagnostics().iter().filter_map(|diag| diag.code()).collect();
    assert_eq!(codes, vec![ErrorCode::E204, ErrorCode::E001, ErrorCode::E205]);

    for &id in &directive_nodes(&tree) {
        for diag in tree.node(id).kind().diagnostics() {
            assert_eq!(diag.primary_span(), Some(tree.node(id).span()));
        }
    }
    assert!(tree.check().is_err());
}

#[test]
fn test_empty_document() {
    let tree = assert_lossless("");

    assert!(top_level(&tree).is_empty());
    assert_eq!(tree.node(tree.root()).full_span(), Span::new(0..0));
    assert_eq!(tree.node_at(0), Some(tree.root()));
    assert_eq!(tree.kernel_at(0), Some(Id::new("csharp")));
    assert!(tree.check().is_ok());
}

#[test]
fn test_custom_default_kernel() {
    let tree = parse_with_default_kernel("let x = 1\n#!time\n", &registry(), Id::new("fsharp"));

    assert_eq!(layout(&tree), vec!["lang:fsharp", "action:#!time@fsharp"]);
    assert_eq!(tree.default_kernel(), Id::new("fsharp"));
}

#[test]
fn test_node_at_and_kernel_at() {
    // "x\n" 0..2, "#!fsharp\n" 2..11, "#!time\n" 11..18, "y" 18..19
    let tree = assert_lossless("x\n#!fsharp\n#!time\ny");
    let nodes = top_level(&tree);

    assert_eq!(tree.node_at(0), Some(nodes[0]));
    assert_eq!(tree.node_at(1), Some(nodes[0]));
    assert_eq!(tree.node_at(2), Some(nodes[1]));
    assert_eq!(tree.node_at(11), Some(nodes[2]));
    assert_eq!(tree.node_at(19), Some(nodes[3]));
    assert_eq!(tree.node_at(20), None);

    assert_eq!(tree.kernel_at(0), Some(Id::new("csharp")));
    assert_eq!(tree.kernel_at(5), None);
    assert_eq!(tree.kernel_at(12), Some(Id::new("fsharp")));
    assert_eq!(tree.kernel_at(18), Some(Id::new("fsharp")));
}

#[test]
fn test_navigation() {
    let tree = assert_lossless("x\n#!fsharp\ny\n");
    let root = tree.root();
    let nodes = top_level(&tree);

    assert_eq!(tree.parent(root), None);
    assert_eq!(tree.parent(nodes[1]), Some(root));
    assert_eq!(tree.ancestors(nodes[2]).collect::<Vec<_>>(), vec![root]);
    assert_eq!(tree.descendants(root), nodes);
    assert_eq!(tree.len(), 4);
    assert_eq!(
        tree.nodes().map(|(id, _)| id).skip(1).collect::<Vec<_>>(),
        nodes
    );
}

#[test]
fn test_dump() {
    let tree = assert_lossless("x\n#!fsharp\n");

    assert_eq!(
        tree.dump(),
        "Submission 0..11\n  Language(csharp) 0..2 \"x\\n\"\n  KernelName(fsharp) 2..11 \"#!fsharp\"\n"
    );
}

#[test]
fn test_parse_is_deterministic() {
    let source = "#!csharp --bad\n#!time\nx\n#!nope\n#!proxyKernel\n#!time\n";

    assert_eq!(parse(source, &registry()), parse(source, &registry()));
}

mod proptest_tests {
    use proptest::prelude::*;

    use super::*;

    // ===================
    // Strategies
    // ===================

    /// A single line drawn from directive-shaped and free-form text.
    fn line_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("#!csharp".to_string()),
            Just("#!fsharp".to_string()),
            Just("#!proxyKernel".to_string()),
            Just("#!time".to_string()),
            Just("#!set --name x --value \"a b\"".to_string()),
            Just("#!set --bogus".to_string()),
            Just("#!nope".to_string()),
            Just("#!".to_string()),
            Just("#r \"nuget: X, 1.0\"".to_string()),
            Just("#r \"open".to_string()),
            Just("   #!fsharp".to_string()),
            "[ -~]{0,24}",
            "\\PC{0,12}",
        ]
    }

    fn document_strategy() -> impl Strategy<Value = String> {
        (
            prop::collection::vec((line_strategy(), prop::bool::ANY), 0..16),
            prop::bool::ANY,
        )
            .prop_map(|(lines, trailing)| {
                let mut document = String::new();
                let count = lines.len();
                for (index, (line, crlf)) in lines.into_iter().enumerate() {
                    document.push_str(&line);
                    if index + 1 < count || trailing {
                        document.push_str(if crlf { "\r\n" } else { "\n" });
                    }
                }
                document
            })
    }

    // ===================
    // Property Test Functions
    // ===================

    fn check_round_trip(source: &str) -> Result<(), TestCaseError> {
        let tree = parse(source, &registry());
        prop_assert_eq!(tree.to_original_text(), source);
        Ok(())
    }

    fn check_span_invariants(source: &str) -> Result<(), TestCaseError> {
        let tree = parse(source, &registry());
        prop_assert_eq!(tree.verify_invariants(), Ok(()));
        prop_assert_eq!(tree.node(tree.root()).full_span(), Span::new(0..source.len()));

        for diag in tree.diagnostics() {
            let span = diag.primary_span();
            prop_assert!(span.is_some(), "diagnostic without a primary span: {diag}");
        }
        Ok(())
    }

    fn check_marker_locality(prefix: &str) -> Result<(), TestCaseError> {
        let source = format!("{prefix}#!fsharp\n{prefix}#!time");
        let tree = parse(&source, &registry());
        prop_assert_eq!(layout(&tree), vec!["lang:csharp".to_string()]);
        Ok(())
    }

    fn check_deterministic(source: &str) -> Result<(), TestCaseError> {
        prop_assert_eq!(parse(source, &registry()), parse(source, &registry()));
        Ok(())
    }

    fn check_node_at_is_inside(source: &str, offset: usize) -> Result<(), TestCaseError> {
        let tree = parse(source, &registry());
        let offset = offset % (source.len() + 1);
        let node = tree.node_at(offset);
        prop_assert!(node.is_some());
        if let Some(node) = node {
            let span = tree.node(node).full_span();
            prop_assert!(span.start() <= offset && offset <= span.end());
        }
        Ok(())
    }

    // ===================
    // Proptest Wrappers
    // ===================

    proptest! {
        #[test]
        fn generated_documents_round_trip(source in document_strategy()) {
            check_round_trip(&source)?;
        }

        #[test]
        fn arbitrary_text_round_trips(source in any::<String>()) {
            check_round_trip(&source)?;
        }

        #[test]
        fn spans_tile_the_document(source in document_strategy()) {
            check_span_invariants(&source)?;
        }

        #[test]
        fn marker_after_text_is_never_a_directive(prefix in "[a-z0-9;][a-z0-9 ;]{0,10}") {
            check_marker_locality(&prefix)?;
        }

        #[test]
        fn parsing_is_deterministic(source in document_strategy()) {
            check_deterministic(&source)?;
        }

        #[test]
        fn node_at_contains_offset(source in document_strategy(), offset in any::<usize>()) {
            check_node_at_is_inside(&source, offset)?;
        }
    }
}
