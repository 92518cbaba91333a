//! Error types for the scoping engine and container.

use std::fmt;

/// Dependency injection errors
///
/// Represents the failure conditions that can occur while binding, classifying
/// or resolving instances in lineage-di.
///
/// # Examples
///
/// ```rust
/// use lineage_di::{Container, DiError, ScopeRegistry, ScopedStorage};
///
/// let storage = ScopedStorage::new();
/// let unit = storage.enter();
/// let container = Container::new(ScopeRegistry::new(), storage.clone());
///
/// // Nothing was ever created for this key
/// match container.get(&unit, "Mailer") {
///     Err(DiError::NotFound(key)) => assert_eq!(key, "Mailer"),
///     _ => unreachable!(),
/// }
/// ```
///
/// ```rust
/// use lineage_di::DiError;
///
/// let unresolvable = DiError::UnresolvableScope("app::Cache".to_string());
/// let cycle = DiError::AliasCycle(vec!["a".to_string(), "b".to_string(), "a".to_string()]);
///
/// println!("Error: {}", unresolvable);
/// println!("Error: {}", cycle);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiError {
    /// No instance exists and nothing is bound for the key
    NotFound(String),
    /// Stored instance could not be downcast to the requested type
    TypeMismatch(&'static str),
    /// Metadata source cannot describe the key, so no scope can be decided
    UnresolvableScope(String),
    /// Alias chain loops back on itself (includes path)
    AliasCycle(Vec<String>),
    /// Factories depend on each other in a loop (includes path)
    Circular(Vec<String>),
    /// Alias chain or resolution nesting deeper than the allowed maximum
    DepthExceeded(usize),
    /// Invalid configuration value
    Config(String),
    /// Instance factory reported a failure
    Factory {
        /// Key whose factory failed
        key: String,
        /// Factory-provided reason
        message: String,
    },
}

impl DiError {
    /// Builds a [`DiError::Factory`] for `key`.
    pub fn factory(key: impl Into<String>, message: impl Into<String>) -> Self {
        DiError::Factory {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Whether this error belongs to the "nothing to resolve" family.
    ///
    /// Alias and dependency cycles are reported as distinct variants but
    /// callers that only care about "could not find it" treat them the same
    /// as `NotFound`.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DiError::NotFound(_) | DiError::AliasCycle(_) | DiError::Circular(_)
        )
    }
}

impl fmt::Display for DiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiError::NotFound(key) => write!(f, "Service not found: {}", key),
            DiError::TypeMismatch(name) => write!(f, "Type mismatch for: {}", name),
            DiError::UnresolvableScope(key) => {
                write!(f, "Cannot determine scope for: {}", key)
            }
            DiError::AliasCycle(path) => {
                write!(f, "Service not found, alias cycle: {}", path.join(" -> "))
            }
            DiError::Circular(path) => {
                write!(f, "Service not found, circular dependency: {}", path.join(" -> "))
            }
            DiError::DepthExceeded(depth) => write!(f, "Max depth {} exceeded", depth),
            DiError::Config(msg) => write!(f, "Configuration error: {}", msg),
            DiError::Factory { key, message } => {
                write!(f, "Factory for {} failed: {}", key, message)
            }
        }
    }
}

impl std::error::Error for DiError {}

/// Result type for DI operations
///
/// A convenience alias for `Result<T, DiError>` used throughout lineage-di.
///
/// ```rust
/// use lineage_di::{DiError, DiResult};
///
/// fn open_pool() -> DiResult<u32> {
///     Err(DiError::factory("Pool", "connection refused"))
/// }
///
/// assert!(open_pool().is_err());
/// ```
pub type DiResult<T> = Result<T, DiError>;
