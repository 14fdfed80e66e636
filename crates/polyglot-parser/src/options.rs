//! Directive option parsing.
//!
//! Directive arguments are matched against the directive's
//! [`OptionSchema`]. Every problem becomes a [`Diagnostic`] whose primary label
//! is the whole directive line and whose secondary label points at the
//! offending token; parsing always continues to the end of the line so that
//! one pass reports every problem.

use indexmap::IndexMap;

use polyglot_core::schema::{Arity, OptionSchema, OptionSpec, PositionalSpec};

use crate::{
    error::{Diagnostic, ErrorCode},
    lexer::ArgToken,
    span::{Span, Spanned},
};

/// The value recorded for one named option.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    /// A flag that was present; the span is the flag token.
    Flag(Span),
    Single(Spanned<String>),
    Multiple(Vec<Spanned<String>>),
}

impl OptionValue {
    /// The first value, if the option carries any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::Flag(_) => None,
            OptionValue::Single(value) => Some(value.inner().as_str()),
            OptionValue::Multiple(values) => values.first().map(|value| value.inner().as_str()),
        }
    }

    /// Every value in order. Empty for flags.
    pub fn values(&self) -> Vec<&str> {
        match self {
            OptionValue::Flag(_) => Vec::new(),
            OptionValue::Single(value) => vec![value.inner().as_str()],
            OptionValue::Multiple(values) => values.iter().map(|value| value.inner().as_str()).collect(),
        }
    }
}

/// Options and positional arguments read from one directive line.
///
/// Named options are keyed by their canonical name, whichever alias was used.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectiveOptions {
    named: IndexMap<String, OptionValue>,
    positionals: IndexMap<String, Vec<Spanned<String>>>,
}

impl DirectiveOptions {
    pub fn is_empty(&self) -> bool {
        self.named.is_empty() && self.positionals.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.named.get(name)
    }

    /// Returns `true` if the flag or option `name` was given.
    pub fn has(&self, name: &str) -> bool {
        self.named.contains_key(name)
    }

    /// The value of a single-valued option.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.named.get(name).and_then(OptionValue::as_str)
    }

    /// The first value bound to positional `name`.
    pub fn positional(&self, name: &str) -> Option<&str> {
        self.positionals
            .get(name)
            .and_then(|values| values.first())
            .map(|value| value.inner().as_str())
    }

    pub fn named(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.named.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn positionals(&self) -> impl Iterator<Item = (&str, &[Spanned<String>])> {
        self.positionals
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }
}

/// Reads `tokens` against `schema`.
///
/// `directive` is the directive name used in messages and `line` the span of
/// the whole directive, used as every diagnostic's primary label.
pub(crate) fn parse_options(
    schema: &OptionSchema,
    directive: &str,
    tokens: &[ArgToken],
    line: Span,
) -> (DirectiveOptions, Vec<Diagnostic>) {
    let mut parser = OptionParser {
        schema,
        directive,
        line,
        options: DirectiveOptions::default(),
        diagnostics: Vec::new(),
        next_positional: 0,
    };
    parser.run(tokens);
    parser.check_required();
    (parser.options, parser.diagnostics)
}

struct OptionParser<'a> {
    schema: &'a OptionSchema,
    directive: &'a str,
    line: Span,
    options: DirectiveOptions,
    diagnostics: Vec<Diagnostic>,
    next_positional: usize,
}

impl OptionParser<'_> {
    fn run(&mut self, tokens: &[ArgToken]) {
        let mut index = 0;
        while index < tokens.len() {
            let token = &tokens[index];
            index += 1;

            if !token.looks_like_option() {
                self.positional(token);
                continue;
            }

            let (name, inline) = split_inline_value(token);
            let Some(spec) = self.schema.find_option(name) else {
                self.unknown_option(name, token.span());
                continue;
            };

            match spec.arity() {
                Arity::Zero => self.flag(spec, token, inline),
                Arity::One => {
                    let value = match inline {
                        Some(value) => Some(value),
                        None => take_value(tokens, &mut index),
                    };
                    self.single(spec, token, value);
                }
                Arity::Many => {
                    let mut values: Vec<_> = inline.into_iter().collect();
                    while let Some(value) = take_value(tokens, &mut index) {
                        values.push(value);
                    }
                    self.many(spec, token, values);
                }
            }
        }
    }

    fn flag(&mut self, spec: &OptionSpec, token: &ArgToken, inline: Option<Spanned<String>>) {
        if let Some(value) = inline {
            self.emit(
                Diagnostic::error(format!(
                    "option `{}` of `{}` does not take a value",
                    spec.name(),
                    self.directive
                ))
                .with_code(ErrorCode::E202)
                .with_secondary_label(value.span(), "unexpected value"),
            );
            return;
        }
        if self.reject_duplicate(spec, token.span()) {
            return;
        }
        self.options
            .named
            .insert(spec.name().to_owned(), OptionValue::Flag(token.span()));
    }

    fn single(&mut self, spec: &OptionSpec, token: &ArgToken, value: Option<Spanned<String>>) {
        let Some(value) = value else {
            self.missing_value(spec, token.span());
            return;
        };
        if self.reject_duplicate(spec, token.span()) || !self.validate_option(spec, &value) {
            return;
        }
        self.options
            .named
            .insert(spec.name().to_owned(), OptionValue::Single(value));
    }

    fn many(&mut self, spec: &OptionSpec, token: &ArgToken, values: Vec<Spanned<String>>) {
        if values.is_empty() {
            self.missing_value(spec, token.span());
            return;
        }

        let mut accepted = Vec::with_capacity(values.len());
        for value in values {
            if self.validate_option(spec, &value) {
                accepted.push(value);
            }
        }

        if let OptionValue::Multiple(existing) = self
            .options
            .named
            .entry(spec.name().to_owned())
            .or_insert_with(|| OptionValue::Multiple(Vec::new()))
        {
            existing.extend(accepted);
        }
    }

    fn positional(&mut self, token: &ArgToken) {
        let positionals = self.schema.positionals();
        let spec = match positionals.get(self.next_positional) {
            Some(spec) => Some(spec),
            None => positionals.last().filter(|spec| spec.is_variadic()),
        };

        let Some(spec) = spec else {
            self.emit(
                Diagnostic::error(format!(
                    "unexpected argument `{}` for `{}`",
                    token.value(),
                    self.directive
                ))
                .with_code(ErrorCode::E203)
                .with_secondary_label(token.span(), "unexpected argument")
                .with_help(self.usage_help()),
            );
            return;
        };

        if !spec.is_variadic() {
            self.next_positional += 1;
        }

        let value = Spanned::new(token.value().to_owned(), token.span());
        if !self.validate_positional(spec, &value) {
            return;
        }
        self.options
            .positionals
            .entry(spec.name().to_owned())
            .or_default()
            .push(value);
    }

    fn check_required(&mut self) {
        let missing_options: Vec<String> = self
            .schema
            .options()
            .iter()
            .filter(|spec| spec.is_required() && !self.options.has(spec.name()))
            .map(|spec| spec.name().to_owned())
            .collect();
        for name in missing_options {
            self.emit(
                Diagnostic::error(format!(
                    "missing required option `{name}` for `{}`",
                    self.directive
                ))
                .with_code(ErrorCode::E204),
            );
        }

        let missing_positionals: Vec<String> = self
            .schema
            .positionals()
            .iter()
            .filter(|spec| spec.is_required() && !self.options.positionals.contains_key(spec.name()))
            .map(|spec| spec.name().to_owned())
            .collect();
        for name in missing_positionals {
            self.emit(
                Diagnostic::error(format!(
                    "missing required argument `{name}` for `{}`",
                    self.directive
                ))
                .with_code(ErrorCode::E205),
            );
        }
    }

    fn reject_duplicate(&mut self, spec: &OptionSpec, span: Span) -> bool {
        if !self.options.has(spec.name()) {
            return false;
        }
        self.emit(
            Diagnostic::error(format!(
                "option `{}` given more than once for `{}`",
                spec.name(),
                self.directive
            ))
            .with_code(ErrorCode::E206)
            .with_secondary_label(span, "repeated here"),
        );
        true
    }

    fn validate_option(&mut self, spec: &OptionSpec, value: &Spanned<String>) -> bool {
        match spec.value_kind().validate(value.inner()) {
            Ok(()) => true,
            Err(reason) => {
                self.invalid_value(format!("invalid value for `{}`: {reason}", spec.name()), value);
                false
            }
        }
    }

    fn validate_positional(&mut self, spec: &PositionalSpec, value: &Spanned<String>) -> bool {
        match spec.value_kind().validate(value.inner()) {
            Ok(()) => true,
            Err(reason) => {
                self.invalid_value(
                    format!("invalid value for argument `{}`: {reason}", spec.name()),
                    value,
                );
                false
            }
        }
    }

    fn invalid_value(&mut self, message: String, value: &Spanned<String>) {
        self.emit(
            Diagnostic::error(message)
                .with_code(ErrorCode::E202)
                .with_secondary_label(value.span(), "invalid value"),
        );
    }

    fn missing_value(&mut self, spec: &OptionSpec, span: Span) {
        self.emit(
            Diagnostic::error(format!(
                "missing value for option `{}` of `{}`",
                spec.name(),
                self.directive
            ))
            .with_code(ErrorCode::E201)
            .with_secondary_label(span, "expects a value"),
        );
    }

    fn unknown_option(&mut self, name: &str, span: Span) {
        self.emit(
            Diagnostic::error(format!(
                "unknown option `{name}` for `{}`",
                self.directive
            ))
            .with_code(ErrorCode::E200)
            .with_secondary_label(span, "unknown option")
            .with_help(self.usage_help()),
        );
    }

    fn usage_help(&self) -> String {
        let options: Vec<&str> = self.schema.options().iter().map(OptionSpec::name).collect();
        if options.is_empty() && self.schema.positionals().is_empty() {
            format!("`{}` takes no arguments", self.directive)
        } else if options.is_empty() {
            format!("`{}` takes no options", self.directive)
        } else {
            format!("expected one of: {}", options.join(", "))
        }
    }

    /// Pins the primary label to the directive line before recording.
    fn emit(&mut self, diagnostic: Diagnostic) {
        let diagnostic = diagnostic.with_label(self.line, "in this directive");
        self.diagnostics.push(diagnostic);
    }
}

/// Splits `--name=value` into the option name and an inline value.
fn split_inline_value(token: &ArgToken) -> (&str, Option<Spanned<String>>) {
    match token.value().split_once('=') {
        Some((name, value)) => {
            let span = Span::new(token.span().start() + name.len() + 1..token.span().end());
            (name, Some(Spanned::new(value.to_owned(), span)))
        }
        None => (token.value(), None),
    }
}

/// Consumes the next token as a value unless it is itself an option.
fn take_value(tokens: &[ArgToken], index: &mut usize) -> Option<Spanned<String>> {
    let token = tokens.get(*index).filter(|token| !token.looks_like_option())?;
    *index += 1;
    Some(Spanned::new(token.value().to_owned(), token.span()))
}

#[cfg(test)]
mod tests {
    use polyglot_core::schema::ValueKind;

    use super::*;
    use crate::lexer::tokenize_arguments;

    fn parse(schema: &OptionSchema, args: &str) -> (DirectiveOptions, Vec<Diagnostic>) {
        let (tokens, error) = tokenize_arguments(args, 0);
        assert!(error.is_none(), "tokenizing failed: {error:?}");
        parse_options(schema, "#!test", &tokens, Span::new(0..args.len()))
    }

    fn codes(diagnostics: &[Diagnostic]) -> Vec<ErrorCode> {
        diagnostics.iter().filter_map(Diagnostic::code).collect()
    }

    fn set_schema() -> OptionSchema {
        OptionSchema::new()
            .with_option(OptionSpec::value("--name").with_alias("-n").required())
            .with_option(OptionSpec::value("--value"))
            .with_option(OptionSpec::flag("--byref"))
    }

    #[test]
    fn test_empty_schema_accepts_nothing() {
        let (options, diagnostics) = parse(&OptionSchema::new(), "");

        assert!(options.is_empty());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_unknown_option_on_empty_schema() {
        let (_, diagnostics) = parse(&OptionSchema::new(), " --invalid-option");

        assert_eq!(codes(&diagnostics), vec![ErrorCode::E200]);
        assert_eq!(diagnostics[0].primary_span(), Some(Span::new(0..17)));
        assert_eq!(diagnostics[0].help(), Some("`#!test` takes no arguments"));
    }

    #[test]
    fn test_named_options_and_aliases() {
        let (options, diagnostics) = parse(&set_schema(), " -n x --value=\"hello world\" --byref");

        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        assert_eq!(options.value("--name"), Some("x"));
        assert_eq!(options.value("--value"), Some("hello world"));
        assert!(options.has("--byref"));
    }

    #[test]
    fn test_missing_value_and_required() {
        let (_, diagnostics) = parse(&set_schema(), " --value --byref");

        assert_eq!(codes(&diagnostics), vec![ErrorCode::E201, ErrorCode::E204]);
    }

    #[test]
    fn test_flag_rejects_inline_value() {
        let (options, diagnostics) = parse(&set_schema(), " --name a --byref=yes");

        assert_eq!(codes(&diagnostics), vec![ErrorCode::E202]);
        assert!(!options.has("--byref"));
    }

    #[test]
    fn test_duplicate_option() {
        let (options, diagnostics) = parse(&set_schema(), " --name a -n b");

        assert_eq!(codes(&diagnostics), vec![ErrorCode::E206]);
        assert_eq!(options.value("--name"), Some("a"));
    }

    #[test]
    fn test_value_validation() {
        let schema = OptionSchema::new()
            .with_option(OptionSpec::value("--count").with_value_kind(ValueKind::Integer));
        let (_, diagnostics) = parse(&schema, " --count many");

        assert_eq!(codes(&diagnostics), vec![ErrorCode::E202]);
        assert_eq!(diagnostics[0].labels()[0].span(), Span::new(9..13));
    }

    #[test]
    fn test_many_consumes_until_next_option() {
        let schema = OptionSchema::new()
            .with_option(OptionSpec::many("--tags"))
            .with_option(OptionSpec::flag("--all"));
        let (options, diagnostics) = parse(&schema, " --tags a b c --all --tags d");

        assert!(diagnostics.is_empty());
        assert_eq!(options.get("--tags").unwrap().values(), vec!["a", "b", "c", "d"]);
        assert!(options.has("--all"));
    }

    #[test]
    fn test_positionals() {
        let schema = OptionSchema::new()
            .with_option(OptionSpec::value("--from").required())
            .with_positional(PositionalSpec::new("name").required());
        let (options, diagnostics) = parse(&schema, " --from csharp x");

        assert!(diagnostics.is_empty());
        assert_eq!(options.positional("name"), Some("x"));
    }

    #[test]
    fn test_unexpected_and_missing_positionals() {
        let schema = OptionSchema::new().with_positional(PositionalSpec::new("name").required());

        let (_, diagnostics) = parse(&schema, "");
        assert_eq!(codes(&diagnostics), vec![ErrorCode::E205]);

        let (_, diagnostics) = parse(&schema, " a b");
        assert_eq!(codes(&diagnostics), vec![ErrorCode::E203]);
    }

    #[test]
    fn test_variadic_positional() {
        let schema = OptionSchema::new().with_positional(PositionalSpec::new("files").variadic());
        let (options, diagnostics) = parse(&schema, " a.cs b.cs c.cs");

        assert!(diagnostics.is_empty());
        let (name, values) = options.positionals().next().unwrap();
        assert_eq!(name, "files");
        assert_eq!(values.len(), 3);
    }

    #[test]
    fn test_negative_number_is_a_value() {
        let schema = OptionSchema::new()
            .with_option(OptionSpec::value("--offset").with_value_kind(ValueKind::Integer));
        let (options, diagnostics) = parse(&schema, " --offset -3");

        assert!(diagnostics.is_empty());
        assert_eq!(options.value("--offset"), Some("-3"));
    }
}
