//! Option schemas for directives.
//!
//! Every directive (kernel selector or action) declares the options and
//! positional arguments it accepts as a small table. The parser walks that
//! table instead of hand-coding each directive, so "unknown option" and
//! "invalid value" diagnostics fall out of the schema itself.
//!
//! # Example
//!
//! ```
//! use polyglot_core::schema::{OptionSchema, OptionSpec, PositionalSpec, ValueKind};
//!
//! let schema = OptionSchema::new()
//!     .with_option(OptionSpec::value("--name").with_alias("-n").required())
//!     .with_option(OptionSpec::flag("--byref"))
//!     .with_positional(PositionalSpec::new("value").with_value_kind(ValueKind::Integer));
//!
//! assert!(schema.find_option("-n").is_some());
//! assert!(schema.find_option("--missing").is_none());
//! ```

use serde::Deserialize;

/// How many values an option consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arity {
    /// A flag: present or absent, never followed by a value.
    Zero,
    /// Exactly one value, either `--name value` or `--name=value`.
    #[default]
    One,
    /// One or more values; consumes every following token that is not an option.
    Many,
}

/// Validator applied to option and positional values.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueKind {
    /// Any text is accepted.
    #[default]
    Any,
    /// A base-10 integer, optionally signed.
    Integer,
    /// `true` or `false`.
    Boolean,
    /// One of a fixed set of words.
    OneOf(Vec<String>),
}

impl ValueKind {
    /// Checks `value` against this validator.
    ///
    /// # Errors
    ///
    /// Returns a short, human readable reason when the value is rejected.
    pub fn validate(&self, value: &str) -> Result<(), String> {
        match self {
            ValueKind::Any => Ok(()),
            ValueKind::Integer => value
                .parse::<i64>()
                .map(|_| ())
                .map_err(|_| format!("`{value}` is not an integer")),
            ValueKind::Boolean => match value {
                "true" | "false" => Ok(()),
                _ => Err(format!("`{value}` is not `true` or `false`")),
            },
            ValueKind::OneOf(choices) => {
                if choices.iter().any(|choice| choice == value) {
                    Ok(())
                } else {
                    Err(format!(
                        "`{value}` is not one of: {}",
                        choices.join(", ")
                    ))
                }
            }
        }
    }
}

/// A named option such as `--name` with its aliases.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OptionSpec {
    name: String,

    #[serde(default)]
    aliases: Vec<String>,

    #[serde(default)]
    arity: Arity,

    #[serde(default)]
    value: ValueKind,

    #[serde(default)]
    required: bool,
}

impl OptionSpec {
    /// A flag option (arity zero).
    pub fn flag(name: impl Into<String>) -> Self {
        Self::with_arity(name, Arity::Zero)
    }

    /// A single-valued option.
    pub fn value(name: impl Into<String>) -> Self {
        Self::with_arity(name, Arity::One)
    }

    /// A multi-valued option.
    pub fn many(name: impl Into<String>) -> Self {
        Self::with_arity(name, Arity::Many)
    }

    fn with_arity(name: impl Into<String>, arity: Arity) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            arity,
            value: ValueKind::Any,
            required: false,
        }
    }

    /// Adds an alternative spelling, e.g. `-n` for `--name`.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Sets the validator for this option's values.
    pub fn with_value_kind(mut self, value: ValueKind) -> Self {
        self.value = value;
        self
    }

    /// Marks the option as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    pub fn value_kind(&self) -> &ValueKind {
        &self.value
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Returns `true` if `token` is this option's name or one of its aliases.
    pub fn matches(&self, token: &str) -> bool {
        self.name == token || self.aliases.iter().any(|alias| alias == token)
    }

    /// Every spelling of this option, canonical name first.
    pub fn spellings(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

/// A positional argument.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PositionalSpec {
    name: String,

    #[serde(default)]
    value: ValueKind,

    #[serde(default)]
    required: bool,

    /// Consumes every remaining positional token.
    #[serde(default)]
    variadic: bool,
}

impl PositionalSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: ValueKind::Any,
            required: false,
            variadic: false,
        }
    }

    pub fn with_value_kind(mut self, value: ValueKind) -> Self {
        self.value = value;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_kind(&self) -> &ValueKind {
        &self.value
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic
    }
}

/// The full option table of one directive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OptionSchema {
    #[serde(default)]
    options: Vec<OptionSpec>,

    #[serde(default)]
    positionals: Vec<PositionalSpec>,
}

impl OptionSchema {
    /// An empty schema: the directive accepts no arguments at all.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_option(mut self, option: OptionSpec) -> Self {
        self.options.push(option);
        self
    }

    pub fn with_positional(mut self, positional: PositionalSpec) -> Self {
        self.positionals.push(positional);
        self
    }

    pub fn options(&self) -> &[OptionSpec] {
        &self.options
    }

    pub fn positionals(&self) -> &[PositionalSpec] {
        &self.positionals
    }

    /// Finds the option spelled `token`, by name or alias.
    pub fn find_option(&self, token: &str) -> Option<&OptionSpec> {
        self.options.iter().find(|option| option.matches(token))
    }

    /// Returns `true` when the directive takes no options and no positionals.
    pub fn is_empty(&self) -> bool {
        self.options.is_empty() && self.positionals.is_empty()
    }

    /// Checks the table itself for mistakes that would make parsing ambiguous.
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found: an option name not
    /// starting with `-`, a spelling used twice, a required positional after an
    /// optional one, or a variadic positional that is not last.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen: Vec<&str> = Vec::new();
        for option in &self.options {
            for spelling in option.spellings() {
                if !spelling.starts_with('-') || spelling.len() < 2 {
                    return Err(format!("option `{spelling}` must start with `-`"));
                }
                if seen.contains(&spelling) {
                    return Err(format!("option `{spelling}` is declared twice"));
                }
                seen.push(spelling);
            }
        }

        let mut optional_seen = false;
        for (index, positional) in self.positionals.iter().enumerate() {
            if positional.required && optional_seen {
                return Err(format!(
                    "required argument `{}` follows an optional one",
                    positional.name
                ));
            }
            optional_seen |= !positional.required;
            if positional.variadic && index + 1 != self.positionals.len() {
                return Err(format!(
                    "variadic argument `{}` must be the last argument",
                    positional.name
                ));
            }
        }

        Ok(())
    }
}
