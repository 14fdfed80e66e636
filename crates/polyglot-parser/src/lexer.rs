//! Line scanning and directive argument tokenizing.
//!
//! Two layers live here:
//!
//! - [`scan_lines`] splits a document into [`Line`]s. It is lazy and
//!   restartable: calling it again on the same text yields the same lines with
//!   the same spans, and cloning the iterator resumes from the same place.
//! - [`tokenize_arguments`] splits the tail of a directive line (everything
//!   after the directive name) into [`ArgToken`]s, honouring double quotes.
//!
//! Line terminators are `\n` and `\r\n`. A [`Line`]'s `span` excludes the
//! terminator; its `full_span` includes it, so the full spans of all lines
//! tile the document exactly.

use winnow::{
    Parser as _,
    combinator::{alt, cut_err, preceded, repeat, terminated},
    error::{ContextError, ErrMode, ModalResult},
    stream::{LocatingSlice, Location},
    token::{none_of, one_of, take_while},
};

use polyglot_core::directive::DIRECTIVE_PREFIX;

use crate::{error::ErrorCode, span::Span};

/// One physical line of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'src> {
    text: &'src str,
    span: Span,
    full_span: Span,
}

impl<'src> Line<'src> {
    /// The line's content without its terminator.
    pub fn text(&self) -> &'src str {
        self.text
    }

    pub fn span(&self) -> Span {
        self.span
    }

    /// The span including the `\n` or `\r\n` terminator, if any.
    pub fn full_span(&self) -> Span {
        self.full_span
    }

    /// Returns `true` if the first non-blank character is `#`.
    ///
    /// This is only a candidate test; whether the line really is a directive
    /// depends on the registry and the active kernel.
    pub fn is_directive_introducer(&self) -> bool {
        self.text.trim_start().starts_with(DIRECTIVE_PREFIX)
    }

    /// Splits a candidate directive line into its name and argument tail.
    ///
    /// The name is the first whitespace-delimited word, marker included
    /// (`#!csharp`, `#r`). Returns `None` for lines that are not directive
    /// introducers.
    pub fn directive_head(&self) -> Option<DirectiveHead<'src>> {
        if !self.is_directive_introducer() {
            return None;
        }

        let indent = self.text.len() - self.text.trim_start().len();
        let after_indent = &self.text[indent..];
        let name_len = after_indent
            .find(char::is_whitespace)
            .unwrap_or(after_indent.len());

        let name_start = self.span.start() + indent;
        let rest_start = indent + name_len;

        Some(DirectiveHead {
            name: &after_indent[..name_len],
            name_span: Span::new(name_start..name_start + name_len),
            rest: &self.text[rest_start..],
            rest_offset: self.span.start() + rest_start,
        })
    }
}

/// The name and unparsed argument tail of a directive line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectiveHead<'src> {
    pub name: &'src str,
    pub name_span: Span,
    pub rest: &'src str,
    /// Absolute document offset of `rest`.
    pub rest_offset: usize,
}

/// Lazy iterator over the [`Line`]s of a document.
#[derive(Debug, Clone)]
pub struct LineScanner<'src> {
    source: &'src str,
    offset: usize,
}

impl<'src> Iterator for LineScanner<'src> {
    type Item = Line<'src>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.source.len() {
            return None;
        }

        let start = self.offset;
        let remaining = &self.source[start..];
        let (content_len, full_len) = match remaining.find('\n') {
            Some(newline) if remaining[..newline].ends_with('\r') => (newline - 1, newline + 1),
            Some(newline) => (newline, newline + 1),
            None => (remaining.len(), remaining.len()),
        };

        self.offset = start + full_len;

        Some(Line {
            text: &remaining[..content_len],
            span: Span::new(start..start + content_len),
            full_span: Span::new(start..start + full_len),
        })
    }
}

/// Scan `source` into lines.
///
/// An empty document has no lines. A trailing terminator does not produce an
/// extra empty line; it belongs to the last line's `full_span`.
pub fn scan_lines(source: &str) -> LineScanner<'_> {
    LineScanner { source, offset: 0 }
}

/// One argument of a directive line, with quotes removed and escapes resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgToken {
    value: String,
    span: Span,
    quoted: bool,
}

impl ArgToken {
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Span of the raw token in the document, quotes included.
    pub fn span(&self) -> Span {
        self.span
    }

    /// Returns `true` if the token began with a quote.
    pub fn is_quoted(&self) -> bool {
        self.quoted
    }

    /// Returns `true` if the token should be read as an option name.
    ///
    /// Quoted tokens and negative numbers are always values.
    pub fn looks_like_option(&self) -> bool {
        !self.quoted
            && self.value.len() > 1
            && self.value.starts_with('-')
            && self.value.parse::<f64>().is_err()
    }
}

/// A tokenizing failure on a directive line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub code: ErrorCode,
    pub message: &'static str,
    pub help: Option<&'static str>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LexerDiagnostic {
    code: ErrorCode,
    message: &'static str,
    help: Option<&'static str>,
    start: usize,
}

type Input<'a> = LocatingSlice<&'a str>;
type IResult<O> = ModalResult<O, ContextError<LexerDiagnostic>>;

/// `\"` and `\\` inside quotes; any other backslash is literal.
fn quoted_escape(input: &mut Input<'_>) -> IResult<char> {
    preceded('\\', one_of(['"', '\\'])).parse_next(input)
}

fn quoted_chunk(input: &mut Input<'_>) -> IResult<(String, bool)> {
    let start = input.current_token_start();

    let content = repeat(0.., alt((quoted_escape, none_of(['"'])))).fold(
        String::new,
        |mut acc, ch| {
            acc.push(ch);
            acc
        },
    );

    preceded(
        '"',
        cut_err(terminated(content, '"')).context(LexerDiagnostic {
            code: ErrorCode::E001,
            message: "unterminated quoted value",
            help: Some("add a closing `\"`"),
            start,
        }),
    )
    .map(|text| (text, true))
    .parse_next(input)
}

fn bare_chunk(input: &mut Input<'_>) -> IResult<(String, bool)> {
    take_while(1.., |c: char| !c.is_whitespace() && c != '"')
        .map(|text: &str| (text.to_owned(), false))
        .parse_next(input)
}

/// A run of bare and quoted chunks with no whitespace between them, so
/// `--name="a b"` is one token with value `--name=a b`.
fn argument(input: &mut Input<'_>) -> IResult<ArgToken> {
    let start = input.current_token_start();

    let (value, first_quoted) = repeat(1.., alt((quoted_chunk, bare_chunk)))
        .fold(
            || (String::new(), None),
            |(mut value, first): (String, Option<bool>), (chunk, quoted)| {
                value.push_str(&chunk);
                (value, first.or(Some(quoted)))
            },
        )
        .parse_next(input)?;

    let end = input.current_token_start();

    Ok(ArgToken {
        value,
        span: Span::new(start..end),
        quoted: first_quoted.unwrap_or(false),
    })
}

fn blank(input: &mut Input<'_>) -> IResult<()> {
    take_while(0.., |c: char| c.is_whitespace())
        .void()
        .parse_next(input)
}

/// Split a directive argument tail into tokens.
///
/// `offset` is the absolute document offset of `rest`; token spans are
/// reported in document coordinates. Tokenizing stops at the first error and
/// returns the tokens read before it.
pub fn tokenize_arguments(rest: &str, offset: usize) -> (Vec<ArgToken>, Option<LexError>) {
    let trimmed = rest.trim_end();
    let mut input = LocatingSlice::new(trimmed);
    let mut tokens = Vec::new();

    while !input.is_empty() {
        match preceded(blank, argument).parse_next(&mut input) {
            Ok(token) => tokens.push(ArgToken {
                span: token.span.shifted(offset),
                ..token
            }),
            Err(err) => {
                let error = convert_err_mode(err, trimmed.len()).shifted(offset);
                return (tokens, Some(error));
            }
        }
    }

    (tokens, None)
}

/// Extracts the `LexerDiagnostic` context from a winnow error.
///
/// Every failure reachable here runs to the end of the line, so the span ends
/// at `end`.
fn convert_err_mode(err: ErrMode<ContextError<LexerDiagnostic>>, end: usize) -> LexError {
    let context_error = match err {
        ErrMode::Backtrack(ctx) | ErrMode::Cut(ctx) => ctx,
        ErrMode::Incomplete(_) => ContextError::new(),
    };

    match context_error.context().next() {
        Some(LexerDiagnostic {
            code,
            message,
            help,
            start,
        }) => LexError {
            code: *code,
            message,
            help: *help,
            span: Span::new(*start..end),
        },
        None => LexError {
            code: ErrorCode::E001,
            message: "malformed directive arguments",
            help: None,
            span: Span::new(0..end),
        },
    }
}

impl LexError {
    fn shifted(self, offset: usize) -> Self {
        Self {
            span: self.span.shifted(offset),
            ..self
        }
    }
}
