//! Command-line argument definitions for the polyglot CLI.
//!
//! This module defines the [`Args`] structure parsed from the command line
//! using [`clap`]. Arguments control the input document, the kernel it is sent
//! to, the output mode, configuration file selection, and logging verbosity.

use clap::Parser;

/// Command-line arguments for the polyglot submission splitter
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input document
    #[arg(help = "Path to the input file")]
    pub input: String,

    /// Kernel the document is submitted to (defaults to the configured one).
    /// The tree is always printed for the configured default kernel.
    #[arg(short, long)]
    pub kernel: Option<String>,

    /// Print the syntax tree instead of the sub-submissions
    #[arg(long)]
    pub tree: bool,

    /// Path to configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}
