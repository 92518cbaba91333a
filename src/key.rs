//! Type keys for scope decisions and instance lookup.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Stable identifier for a bindable type, service name or alias.
///
/// Every tier (bindings, scope decisions, the global table and each unit's
/// context) is keyed by `TypeKey`. Keys are cheap to clone: the name lives in
/// a shared `Arc<str>`.
///
/// # Examples
///
/// ```rust
/// use lineage_di::{TypeKey, key_of_type};
///
/// struct Mailer;
///
/// let named = TypeKey::new("mailer");
/// assert_eq!(named.as_str(), "mailer");
///
/// let typed = key_of_type::<Mailer>();
/// assert!(typed.as_str().ends_with("Mailer"));
///
/// // Keys built from the same name are equal
/// assert_eq!(TypeKey::from("mailer"), named);
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(Arc<str>);

impl TypeKey {
    /// Creates a key from a service name.
    pub fn new(name: impl AsRef<str>) -> Self {
        TypeKey(Arc::from(name.as_ref()))
    }

    /// Creates the key that names the concrete type `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        TypeKey::new(std::any::type_name::<T>())
    }

    /// The key as a string slice; also the unit-context storage key.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.0)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for TypeKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for TypeKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TypeKey {
    fn from(name: &str) -> Self {
        TypeKey::new(name)
    }
}

impl From<String> for TypeKey {
    fn from(name: String) -> Self {
        TypeKey(Arc::from(name))
    }
}

impl From<&String> for TypeKey {
    fn from(name: &String) -> Self {
        TypeKey::new(name)
    }
}

impl From<&TypeKey> for TypeKey {
    fn from(key: &TypeKey) -> Self {
        key.clone()
    }
}

// Helper for creating type keys
#[inline(always)]
pub fn key_of_type<T: ?Sized + 'static>() -> TypeKey {
    TypeKey::of::<T>()
}
