//! Configuration for the kernel and directive set.
//!
//! [`AppConfig`] describes which kernels exist, how they are selected and
//! which actions they accept. It implements [`serde::Deserialize`] so it can
//! be loaded from TOML by the CLI, and [`AppConfig::registry`] turns it into
//! the validated [`DirectiveRegistry`] the parser consumes.
//!
//! Leaving out `kernels` or `actions` keeps the built-in set for that table;
//! giving either replaces the built-in set entirely.
//!
//! # Example
//!
//! ```toml
//! default_kernel = "csharp"
//!
//! [[kernels]]
//! name = "csharp"
//! aliases = ["c#"]
//!
//! [[kernels.actions]]
//! name = "#r"
//! positionals = [{ name = "source", required = true }]
//!
//! [[kernels]]
//! name = "remote"
//! proxy = true
//!
//! [[actions]]
//! name = "#!time"
//! ```

use serde::Deserialize;

use polyglot_core::{
    directive::{ActionSpec, DirectiveRegistry, KernelSpec, RegistryError},
    schema::{OptionSchema, OptionSpec, PositionalSpec},
};

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Kernel that runs text before the first selector.
    #[serde(default = "default_kernel_name")]
    default_kernel: String,

    #[serde(default = "builtin_kernels")]
    kernels: Vec<KernelConfig>,

    /// Actions shared by every local kernel.
    #[serde(default = "builtin_actions")]
    actions: Vec<ActionConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_kernel: default_kernel_name(),
            kernels: builtin_kernels(),
            actions: builtin_actions(),
        }
    }
}

impl AppConfig {
    pub fn new(
        default_kernel: impl Into<String>,
        kernels: Vec<KernelConfig>,
        actions: Vec<ActionConfig>,
    ) -> Self {
        Self {
            default_kernel: default_kernel.into(),
            kernels,
            actions,
        }
    }

    pub fn default_kernel(&self) -> &str {
        &self.default_kernel
    }

    pub fn kernels(&self) -> &[KernelConfig] {
        &self.kernels
    }

    pub fn actions(&self) -> &[ActionConfig] {
        &self.actions
    }

    /// Returns a copy with a different default kernel.
    pub fn with_default_kernel(mut self, kernel: impl Into<String>) -> Self {
        self.default_kernel = kernel.into();
        self
    }

    /// Builds and validates the directive registry.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryError`] when two declarations collide or a name or
    /// option table is malformed.
    pub fn registry(&self) -> Result<DirectiveRegistry, RegistryError> {
        let mut builder = DirectiveRegistry::builder(&self.default_kernel);

        for kernel in &self.kernels {
            builder = builder.kernel(kernel.to_spec()?);
        }
        for action in &self.actions {
            builder = builder.shared_action(action.to_spec());
        }

        builder.build()
    }
}

/// One kernel declaration.
#[derive(Debug, Clone, Deserialize)]
pub struct KernelConfig {
    name: String,

    #[serde(default)]
    aliases: Vec<String>,

    /// Code for a proxy kernel is forwarded unparsed.
    #[serde(default)]
    proxy: bool,

    /// Options accepted on the kernel's selector line.
    #[serde(default)]
    selector: OptionSchema,

    /// Actions only this kernel understands.
    #[serde(default)]
    actions: Vec<ActionConfig>,
}

impl KernelConfig {
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            proxy: false,
            selector: OptionSchema::new(),
            actions: Vec::new(),
        }
    }

    pub fn proxy(name: impl Into<String>) -> Self {
        Self {
            proxy: true,
            ..Self::local(name)
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn with_action(mut self, action: ActionConfig) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_selector(mut self, selector: OptionSchema) -> Self {
        self.selector = selector;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_proxy(&self) -> bool {
        self.proxy
    }

    fn to_spec(&self) -> Result<KernelSpec, RegistryError> {
        let mut spec = if self.proxy {
            KernelSpec::proxy(&self.name)
        } else {
            KernelSpec::local(&self.name)
        };
        for alias in &self.aliases {
            spec = spec.with_alias(alias.clone());
        }
        spec = spec.with_selector_schema(self.selector.clone());

        for action in &self.actions {
            if spec.action(&action.name).is_some() {
                return Err(RegistryError::DuplicateAction {
                    action: action.name.clone(),
                    scope: format!("kernel `{}`", self.name),
                });
            }
            spec = spec.with_action(action.to_spec());
        }

        Ok(spec)
    }
}

/// One action declaration; the option table is written inline.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionConfig {
    name: String,

    #[serde(flatten)]
    schema: OptionSchema,
}

impl ActionConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: OptionSchema::new(),
        }
    }

    pub fn with_schema(name: impl Into<String>, schema: OptionSchema) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn to_spec(&self) -> ActionSpec {
        ActionSpec::with_schema(self.name.clone(), self.schema.clone())
    }
}

fn default_kernel_name() -> String {
    "csharp".to_string()
}

fn source_schema() -> OptionSchema {
    OptionSchema::new().with_positional(PositionalSpec::new("source").required())
}

fn dotnet_kernel(name: &str, aliases: &[&str]) -> KernelConfig {
    let kernel = aliases
        .iter()
        .fold(KernelConfig::local(name), |kernel, alias| {
            kernel.with_alias(*alias)
        });
    kernel
        .with_action(ActionConfig::with_schema("#i", source_schema()))
        .with_action(ActionConfig::with_schema("#r", source_schema()))
}

fn builtin_kernels() -> Vec<KernelConfig> {
    vec![
        dotnet_kernel("csharp", &["c#", "C#"]),
        dotnet_kernel("fsharp", &["f#", "F#"]),
        KernelConfig::local("pwsh").with_alias("powershell"),
        KernelConfig::local("javascript").with_alias("js"),
        KernelConfig::local("html"),
        KernelConfig::local("value"),
    ]
}

fn builtin_actions() -> Vec<ActionConfig> {
    vec![
        ActionConfig::new("#!time"),
        ActionConfig::new("#!who"),
        ActionConfig::new("#!whos"),
        ActionConfig::new("#!lsmagic"),
        ActionConfig::with_schema(
            "#!set",
            OptionSchema::new()
                .with_option(OptionSpec::value("--name").required())
                .with_option(OptionSpec::value("--value"))
                .with_option(OptionSpec::value("--mime-type"))
                .with_option(OptionSpec::flag("--byref")),
        ),
        ActionConfig::with_schema(
            "#!share",
            OptionSchema::new()
                .with_option(OptionSpec::value("--from").required())
                .with_option(OptionSpec::value("--as"))
                .with_option(OptionSpec::value("--mime-type"))
                .with_positional(PositionalSpec::new("name").required()),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use polyglot_core::{
        directive::Resolution,
        identifier::Id,
        schema::{Arity, ValueKind},
    };

    use super::*;

    #[test]
    fn test_default_config_builds_registry() {
        let registry = AppConfig::default().registry().expect("built-in set is valid");

        assert_eq!(registry.default_kernel(), Id::new("csharp"));
        assert_eq!(registry.kernels().count(), 6);
        assert!(matches!(
            registry.resolve(Id::new("csharp"), "#!F#"),
            Resolution::KernelSelector(kernel) if kernel.name() == "fsharp"
        ));
        assert!(matches!(
            registry.resolve(Id::new("pwsh"), "#!set"),
            Resolution::Action(_)
        ));
        assert!(matches!(
            registry.resolve(Id::new("pwsh"), "#r"),
            Resolution::Unknown
        ));
    }

    #[test]
    fn test_deserialize_empty_uses_builtins() {
        let config: AppConfig = toml::from_str("").expect("empty config parses");

        assert_eq!(config.default_kernel(), "csharp");
        assert_eq!(config.kernels().len(), 6);
        assert!(config.actions().iter().any(|action| action.name() == "#!share"));
    }

    #[test]
    fn test_deserialize_custom_kernels() {
        let config: AppConfig = toml::from_str(
            r##"
            default_kernel = "python"

            [[kernels]]
            name = "python"
            aliases = ["py"]

            [[kernels.actions]]
            name = "#!pip"
            positionals = [{ name = "packages", variadic = true }]

            [[kernels]]
            name = "remote"
            proxy = true

            [[actions]]
            name = "#!set"
            options = [
                { name = "--name", required = true },
                { name = "--count", value = "integer" },
                { name = "--verbose", arity = "zero" },
            ]
            "##,
        )
        .expect("custom config parses");

        assert_eq!(config.default_kernel(), "python");
        assert!(config.kernels()[1].is_proxy());

        let registry = config.registry().expect("custom config is valid");
        let Resolution::Action(set) = registry.resolve(Id::new("python"), "#!set") else {
            panic!("#!set should resolve in python");
        };
        let count = set.schema().find_option("--count").unwrap();
        assert_eq!(count.value_kind(), &ValueKind::Integer);
        assert_eq!(set.schema().find_option("--verbose").unwrap().arity(), Arity::Zero);
        assert!(matches!(
            registry.resolve(Id::new("python"), "#!pip"),
            Resolution::Action(_)
        ));
    }

    #[test]
    fn test_duplicate_kernel_action_is_rejected() {
        let config = AppConfig::new(
            "csharp",
            vec![
                KernelConfig::local("csharp")
                    .with_action(ActionConfig::new("#r"))
                    .with_action(ActionConfig::new("#r")),
            ],
            Vec::new(),
        );

        assert_eq!(
            config.registry().unwrap_err(),
            RegistryError::DuplicateAction {
                action: "#r".to_string(),
                scope: "kernel `csharp`".to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_default_kernel_is_rejected() {
        let config = AppConfig::default().with_default_kernel("cobol");

        assert_eq!(
            config.registry().unwrap_err(),
            RegistryError::UnknownDefaultKernel("cobol".to_string())
        );
    }
}
