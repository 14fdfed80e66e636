//! The directive registry.
//!
//! The registry knows which kernels exist, which of them are proxies, the
//! names and aliases that select each kernel, and the actions every kernel
//! understands. It is assembled once from configuration through
//! [`RegistryBuilder`], checked for name collisions at that point, and then
//! shared read-only by every parse.
//!
//! # Name resolution
//!
//! A directive line starts with a candidate name such as `#!csharp`, `#!time`
//! or `#r`. [`DirectiveRegistry::resolve`] maps it, in the context of the
//! currently active kernel, to a [`Resolution`]:
//!
//! 1. A name starting with the [`CONTROL_MARKER`] whose remainder is a kernel
//!    name or alias selects that kernel. Kernel names always win.
//! 2. Otherwise, when the active kernel is local, its own actions are
//!    consulted, then the actions shared by every local kernel.
//! 3. Anything else is [`Resolution::Unknown`].
//!
//! # Example
//!
//! ```
//! use polyglot_core::directive::{ActionSpec, DirectiveRegistry, KernelSpec, Resolution};
//! use polyglot_core::identifier::Id;
//!
//! let registry = DirectiveRegistry::builder("csharp")
//!     .kernel(KernelSpec::local("csharp").with_alias("c#").with_action(ActionSpec::new("#r")))
//!     .kernel(KernelSpec::proxy("remote"))
//!     .shared_action(ActionSpec::new("#!time"))
//!     .build()
//!     .expect("registry is consistent");
//!
//! let csharp = Id::new("csharp");
//! assert!(matches!(registry.resolve(csharp, "#!c#"), Resolution::KernelSelector(k) if k.name() == "csharp"));
//! assert!(matches!(registry.resolve(csharp, "#r"), Resolution::Action(_)));
//! assert!(matches!(registry.resolve(csharp, "#!remote"), Resolution::KernelSelector(k) if k.is_proxy()));
//! assert!(matches!(registry.resolve(Id::new("remote"), "#!time"), Resolution::Unknown));
//! ```

use std::collections::HashMap;

use indexmap::IndexMap;
use log::debug;
use thiserror::Error;

use crate::{identifier::Id, schema::OptionSchema};

/// The reserved marker that introduces kernel selectors and most actions.
pub const CONTROL_MARKER: &str = "#!";

/// The character every directive line starts with after indentation.
///
/// Short kernel directives such as `#r` and `#i` use only this prefix.
pub const DIRECTIVE_PREFIX: char = '#';

/// A named action such as `#!time` or `#r`, with its option table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionSpec {
    name: String,
    schema: OptionSchema,
}

impl ActionSpec {
    /// An action that accepts no arguments.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_schema(name, OptionSchema::new())
    }

    pub fn with_schema(name: impl Into<String>, schema: OptionSchema) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }

    /// The full directive name, marker included.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &OptionSchema {
        &self.schema
    }
}

/// Everything the registry knows about one kernel.
#[derive(Debug, Clone)]
pub struct KernelSpec {
    name: Id,
    aliases: Vec<String>,
    is_proxy: bool,
    selector: OptionSchema,
    actions: IndexMap<String, ActionSpec>,
}

impl KernelSpec {
    /// A kernel executed in-process, whose directives this crate interprets.
    pub fn local(name: &str) -> Self {
        Self::new(name, false)
    }

    /// A kernel hosted remotely; its directive grammar is opaque.
    pub fn proxy(name: &str) -> Self {
        Self::new(name, true)
    }

    fn new(name: &str, is_proxy: bool) -> Self {
        Self {
            name: Id::new(name),
            aliases: Vec::new(),
            is_proxy,
            selector: OptionSchema::new(),
            actions: IndexMap::new(),
        }
    }

    /// Adds another name that selects this kernel (without the marker).
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Sets the options accepted on this kernel's selector line.
    pub fn with_selector_schema(mut self, schema: OptionSchema) -> Self {
        self.selector = schema;
        self
    }

    /// Adds an action scoped to this kernel.
    ///
    /// A later action with the same name replaces the earlier one; use
    /// [`RegistryBuilder`] validation to catch such duplicates from config.
    pub fn with_action(mut self, action: ActionSpec) -> Self {
        self.actions.insert(action.name.clone(), action);
        self
    }

    pub fn name(&self) -> Id {
        self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn is_proxy(&self) -> bool {
        self.is_proxy
    }

    pub fn selector_schema(&self) -> &OptionSchema {
        &self.selector
    }

    pub fn actions(&self) -> impl Iterator<Item = &ActionSpec> {
        self.actions.values()
    }

    pub fn action(&self, name: &str) -> Option<&ActionSpec> {
        self.actions.get(name)
    }
}

/// The outcome of resolving a directive name.
#[derive(Debug, Clone, Copy)]
pub enum Resolution<'r> {
    /// The name selects a kernel.
    KernelSelector(&'r KernelSpec),
    /// The name is an action understood by the active kernel.
    Action(&'r ActionSpec),
    /// The name is neither.
    Unknown,
}

/// Configuration problems detected while building a registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("kernel `{0}` is declared more than once")]
    DuplicateKernel(String),

    #[error("name `{name}` selects both `{first}` and `{second}`")]
    SelectorCollision {
        name: String,
        first: String,
        second: String,
    },

    #[error("action `{action}` collides with the selector of kernel `{kernel}`")]
    ActionShadowedByKernel { action: String, kernel: String },

    #[error("action `{action}` is declared more than once in {scope}")]
    DuplicateAction { action: String, scope: String },

    #[error("invalid directive name `{0}`: must start with `#` and contain no whitespace")]
    InvalidDirectiveName(String),

    #[error("invalid kernel name `{0}`")]
    InvalidKernelName(String),

    #[error("invalid option table for `{directive}`: {reason}")]
    InvalidSchema { directive: String, reason: String },

    #[error("default kernel `{0}` is not declared")]
    UnknownDefaultKernel(String),
}

/// Assembles and validates a [`DirectiveRegistry`].
#[derive(Debug, Clone)]
pub struct RegistryBuilder {
    default_kernel: String,
    kernels: Vec<KernelSpec>,
    shared_actions: Vec<ActionSpec>,
}

impl RegistryBuilder {
    pub fn new(default_kernel: impl Into<String>) -> Self {
        Self {
            default_kernel: default_kernel.into(),
            kernels: Vec::new(),
            shared_actions: Vec::new(),
        }
    }

    pub fn kernel(mut self, kernel: KernelSpec) -> Self {
        self.kernels.push(kernel);
        self
    }

    /// Adds an action available in every local kernel.
    pub fn shared_action(mut self, action: ActionSpec) -> Self {
        self.shared_actions.push(action);
        self
    }

    /// Validates the collected declarations and builds the registry.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryError`] for the first collision or malformed
    /// declaration found. Collisions between a kernel selector and an action
    /// name are rejected here so that parsing never has to arbitrate them.
    pub fn build(self) -> Result<DirectiveRegistry, RegistryError> {
        let mut kernels: IndexMap<Id, KernelSpec> = IndexMap::new();
        let mut selectors: HashMap<String, Id> = HashMap::new();

        for kernel in self.kernels {
            let name = kernel.name.to_name();
            if !is_valid_kernel_name(&name) {
                return Err(RegistryError::InvalidKernelName(name));
            }
            if kernels.contains_key(&kernel.name) {
                return Err(RegistryError::DuplicateKernel(name));
            }

            for selector in std::iter::once(&name).chain(kernel.aliases.iter()) {
                if !is_valid_kernel_name(selector) {
                    return Err(RegistryError::InvalidKernelName(selector.clone()));
                }
                if let Some(first) = selectors.get(selector) {
                    return Err(RegistryError::SelectorCollision {
                        name: selector.clone(),
                        first: first.to_name(),
                        second: name.clone(),
                    });
                }
                selectors.insert(selector.clone(), kernel.name);
            }

            validate_schema(&format!("{CONTROL_MARKER}{name}"), &kernel.selector)?;
            kernels.insert(kernel.name, kernel);
        }

        let mut shared_actions: IndexMap<String, ActionSpec> = IndexMap::new();
        for action in self.shared_actions {
            if shared_actions.contains_key(&action.name) {
                return Err(RegistryError::DuplicateAction {
                    action: action.name,
                    scope: "shared actions".to_string(),
                });
            }
            shared_actions.insert(action.name.clone(), action);
        }

        let scoped = kernels.values().flat_map(|kernel| kernel.actions.values());
        for action in shared_actions.values().chain(scoped) {
            validate_action_name(&action.name)?;
            if let Some(kernel) = action
                .name
                .strip_prefix(CONTROL_MARKER)
                .and_then(|selector| selectors.get(selector))
            {
                return Err(RegistryError::ActionShadowedByKernel {
                    action: action.name.clone(),
                    kernel: kernel.to_name(),
                });
            }
            validate_schema(&action.name, &action.schema)?;
        }

        let default_kernel = Id::existing(&self.default_kernel)
            .filter(|id| kernels.contains_key(id))
            .ok_or_else(|| RegistryError::UnknownDefaultKernel(self.default_kernel.clone()))?;

        debug!(
            kernels = kernels.len(),
            shared_actions = shared_actions.len(),
            default_kernel = self.default_kernel;
            "Directive registry built"
        );

        Ok(DirectiveRegistry {
            kernels,
            selectors,
            shared_actions,
            default_kernel,
        })
    }
}

fn is_valid_kernel_name(name: &str) -> bool {
    !name.is_empty() && !name.chars().any(char::is_whitespace)
}

fn validate_action_name(name: &str) -> Result<(), RegistryError> {
    let valid = name.starts_with(DIRECTIVE_PREFIX)
        && name != CONTROL_MARKER
        && name.len() > DIRECTIVE_PREFIX.len_utf8()
        && !name.chars().any(char::is_whitespace);
    if valid {
        Ok(())
    } else {
        Err(RegistryError::InvalidDirectiveName(name.to_string()))
    }
}

fn validate_schema(directive: &str, schema: &OptionSchema) -> Result<(), RegistryError> {
    schema
        .validate()
        .map_err(|reason| RegistryError::InvalidSchema {
            directive: directive.to_string(),
            reason,
        })
}

/// Read-only directive lookup tables shared by every parse.
#[derive(Debug, Clone)]
pub struct DirectiveRegistry {
    kernels: IndexMap<Id, KernelSpec>,
    selectors: HashMap<String, Id>,
    shared_actions: IndexMap<String, ActionSpec>,
    default_kernel: Id,
}

impl DirectiveRegistry {
    /// Starts building a registry whose default kernel is `default_kernel`.
    pub fn builder(default_kernel: impl Into<String>) -> RegistryBuilder {
        RegistryBuilder::new(default_kernel)
    }

    /// The kernel that owns text appearing before any kernel selector.
    pub fn default_kernel(&self) -> Id {
        self.default_kernel
    }

    pub fn kernel(&self, id: Id) -> Option<&KernelSpec> {
        self.kernels.get(&id)
    }

    /// Looks up a kernel by canonical name or alias, without the marker.
    pub fn kernel_by_name(&self, name: &str) -> Option<&KernelSpec> {
        self.selectors
            .get(name)
            .and_then(|id| self.kernels.get(id))
    }

    /// Returns `true` if `id` names a registered proxy kernel.
    pub fn is_proxy(&self, id: Id) -> bool {
        self.kernels.get(&id).is_some_and(KernelSpec::is_proxy)
    }

    /// Kernels in declaration order.
    pub fn kernels(&self) -> impl Iterator<Item = &KernelSpec> {
        self.kernels.values()
    }

    /// Actions available in every local kernel, in declaration order.
    pub fn shared_actions(&self) -> impl Iterator<Item = &ActionSpec> {
        self.shared_actions.values()
    }

    /// Resolves `candidate` with `active` as the current kernel.
    ///
    /// Callers must pass the kernel active *at this line*: the answer changes
    /// when a selector switches kernels, so results are never cached.
    pub fn resolve(&self, active: Id, candidate: &str) -> Resolution<'_> {
        if let Some(kernel) = candidate
            .strip_prefix(CONTROL_MARKER)
            .and_then(|name| self.kernel_by_name(name))
        {
            return Resolution::KernelSelector(kernel);
        }

        match self.kernels.get(&active) {
            Some(kernel) if !kernel.is_proxy => kernel
                .actions
                .get(candidate)
                .or_else(|| self.shared_actions.get(candidate))
                .map_or(Resolution::Unknown, Resolution::Action),
            _ => Resolution::Unknown,
        }
    }
}
