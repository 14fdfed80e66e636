//! CLI logic for the polyglot submission splitter.
//!
//! Reads a document, parses it against the configured kernels, and prints
//! either the ordered sub-submissions or the syntax tree. Documents with
//! error diagnostics are still printed; the diagnostics come back as an
//! error so the binary can render them and exit non-zero. The diagnostics
//! checked are those of the parse that was printed: a split for a proxy
//! kernel is never interpreted, so it has none.

pub mod error_adapter;

mod args;
mod config;

pub use args::Args;

use std::{
    fs,
    io::{self, Write},
};

use log::info;

use polyglot::{PolyglotError, SubSubmission, SubmissionBuilder, SubmissionKind};

/// Run the polyglot CLI application, printing to standard output.
///
/// # Errors
///
/// Returns `PolyglotError` for:
/// - File I/O errors
/// - Configuration loading errors
/// - An unknown `--kernel`
/// - Error diagnostics in the document, after the output was printed
pub fn run(args: &Args) -> Result<(), PolyglotError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    run_with_output(args, &mut out)
}

/// Like [`run`], but writes the report to `out`.
///
/// # Errors
///
/// See [`run`].
pub fn run_with_output(args: &Args, out: &mut impl Write) -> Result<(), PolyglotError> {
    info!(
        input_path = args.input,
        tree = args.tree;
        "Processing submission"
    );

    let app_config = config::load_config(args.config.as_ref())?;

    let source = fs::read_to_string(&args.input)?;

    let builder = SubmissionBuilder::new(app_config);
    let tree = builder.parse(&source)?;

    let checked = if args.tree {
        out.write_all(tree.dump().as_bytes())?;
        tree.check()
    } else {
        let split = builder.split_tree(&tree, args.kernel.as_deref())?;
        for (index, item) in split.items().iter().enumerate() {
            write_item(out, index, item)?;
        }
        info!(items = split.items().len(); "Sub-submissions printed");
        split.check()
    };
    out.flush()?;

    checked.map_err(|err| PolyglotError::new_parse_error(err, source))
}

fn write_item(out: &mut impl Write, index: usize, item: &SubSubmission) -> io::Result<()> {
    let kind = match item.kind() {
        SubmissionKind::Code => "code".to_string(),
        SubmissionKind::Action { name, .. } => format!("action {name}"),
        SubmissionKind::Failed { .. } => "failed".to_string(),
    };
    writeln!(out, "[{index}] {} ({kind}) {}", item.target(), item.span())?;

    let code = item.code();
    out.write_all(code.as_bytes())?;
    if !code.ends_with('\n') {
        writeln!(out)?;
    }
    Ok(())
}
