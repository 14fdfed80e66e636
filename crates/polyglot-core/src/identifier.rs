//! Interned identifiers for kernel names.
//!
//! Kernel names are compared on every directive line and copied into every
//! language node, so they are stored once in a process-wide string interner
//! and passed around as a `Copy` symbol.

use std::{
    fmt,
    sync::{Mutex, MutexGuard, OnceLock},
};

use string_interner::{DefaultStringInterner, DefaultSymbol};

/// Global string interner backing every [`Id`].
///
/// # Thread Safety
///
/// Access goes through a `Mutex`; the interner only ever grows, so a symbol
/// resolved once stays valid for the lifetime of the process.
static INTERNER: OnceLock<Mutex<DefaultStringInterner>> = OnceLock::new();

fn interner() -> MutexGuard<'static, DefaultStringInterner> {
    INTERNER
        .get_or_init(|| Mutex::new(DefaultStringInterner::new()))
        .lock()
        .expect("Failed to acquire interner lock")
}

/// An interned identifier, used for kernel names.
///
/// # Examples
///
/// ```
/// use polyglot_core::identifier::Id;
///
/// let csharp = Id::new("csharp");
/// assert_eq!(csharp, "csharp");
/// assert_eq!(csharp, Id::new("csharp"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Id(DefaultSymbol);

impl Id {
    /// Creates an `Id` from a name, interning it on first use.
    pub fn new(name: &str) -> Self {
        Self(interner().get_or_intern(name))
    }

    /// Looks up an already interned name without interning it.
    ///
    /// Returns `None` when `name` has never been seen. Useful for lookups
    /// that must not grow the interner with arbitrary user input.
    pub fn existing(name: &str) -> Option<Self> {
        interner().get(name).map(Self)
    }

    /// Returns an owned copy of the identifier's text.
    pub fn to_name(&self) -> String {
        interner()
            .resolve(self.0)
            .expect("Symbol should exist in interner")
            .to_owned()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.to_name();
        f.write_str(&name)
    }
}

impl From<&str> for Id {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl PartialEq<str> for Id {
    /// Allows direct comparison with string slices: `id == "csharp"`
    fn eq(&self, other: &str) -> bool {
        interner()
            .resolve(self.0)
            .is_some_and(|name| name == other)
    }
}

impl PartialEq<&str> for Id {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}
