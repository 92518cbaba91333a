//! Scope classification from declarative markers.
//!
//! Types declare their scope through markers registered at startup, either
//! by hand in a [`ScopeRegistry`] or through the [`HasScopeHint`] trait.
//! The classifier reads those markers through the [`MetadataSource`] seam and
//! turns them into a [`ScopeKind`]. Caching the decision is the
//! [`LifecycleManager`](crate::LifecycleManager)'s job.

use std::fmt;

use crate::internal::{new_map, FastMap};
use crate::lifetime::{ScopeKind, ScopeMarker};
use crate::{DiError, DiResult, TypeKey};

/// Markers declared for one type key.
///
/// `on_type` are markers on the type itself, `on_initializer` markers on its
/// designated static initializer. Both lists keep declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeMetadata {
    /// Markers on the type itself
    pub on_type: Vec<ScopeMarker>,
    /// Markers on the type's static initializer
    pub on_initializer: Vec<ScopeMarker>,
}

impl ScopeMetadata {
    /// A known type without any marker; its scope is inferred.
    pub fn unmarked() -> Self {
        Self::default()
    }

    /// A type carrying a single marker on itself.
    pub fn marked(marker: ScopeMarker) -> Self {
        Self {
            on_type: vec![marker],
            on_initializer: Vec::new(),
        }
    }

    /// Adds a marker on the static initializer.
    pub fn with_initializer_marker(mut self, marker: ScopeMarker) -> Self {
        self.on_initializer.push(marker);
        self
    }

    /// Whether no marker is declared anywhere.
    pub fn is_unmarked(&self) -> bool {
        self.on_type.is_empty() && self.on_initializer.is_empty()
    }
}

/// Source of declarative scope markers.
///
/// Returns the markers for `key`, or [`DiError::UnresolvableScope`] when the
/// key names nothing the source knows about.
///
/// `describe` is called while the decision cache is locked, so it must not
/// resolve anything through the container or lifecycle manager.
///
/// Closures implement this trait, which keeps tests short:
///
/// ```
/// use lineage_di::{MetadataSource, ScopeMetadata, ScopeMarker, TypeKey, DiError};
///
/// let source = |key: &TypeKey| match key.as_str() {
///     "Request" => Ok(ScopeMetadata::marked(ScopeMarker::RequestScoped)),
///     other => Err(DiError::UnresolvableScope(other.to_string())),
/// };
///
/// assert!(source.describe(&TypeKey::new("Request")).is_ok());
/// assert!(source.describe(&TypeKey::new("Nope")).is_err());
/// ```
pub trait MetadataSource: Send + Sync {
    /// Markers declared for `key`.
    fn describe(&self, key: &TypeKey) -> DiResult<ScopeMetadata>;
}

impl<F> MetadataSource for F
where
    F: Fn(&TypeKey) -> DiResult<ScopeMetadata> + Send + Sync,
{
    fn describe(&self, key: &TypeKey) -> DiResult<ScopeMetadata> {
        self(key)
    }
}

/// Scope hint implemented by types that need non-default scoping.
///
/// Both hints default to `None`, meaning "no marker": the scope is then
/// inferred from where the first resolution happens.
///
/// ```
/// use lineage_di::{HasScopeHint, ScopeKind, ScopeRegistry};
///
/// struct CurrentUser;
///
/// impl HasScopeHint for CurrentUser {
///     fn scope_hint() -> Option<ScopeKind> {
///         Some(ScopeKind::RequestScoped)
///     }
/// }
///
/// let mut registry = ScopeRegistry::new();
/// registry.register::<CurrentUser>();
/// ```
pub trait HasScopeHint: 'static {
    /// Marker on the type itself.
    fn scope_hint() -> Option<ScopeKind> {
        None
    }

    /// Marker on the type's static initializer.
    fn initializer_hint() -> Option<ScopeKind> {
        None
    }
}

/// Startup-populated table of scope markers, keyed by [`TypeKey`].
///
/// Keys that were never declared are unknown: describing them fails with
/// [`DiError::UnresolvableScope`]. Declare unmarked types with
/// [`declare`](Self::declare) so that their scope is inferred instead.
///
/// # Examples
///
/// ```
/// use lineage_di::{MetadataSource, ScopeMarker, ScopeRegistry, TypeKey};
///
/// let mut registry = ScopeRegistry::new();
/// registry
///     .declare("Cache")
///     .request_scoped("Request")
///     .singleton("Config")
///     .mark_initializer("Factory", ScopeMarker::RequestScoped);
///
/// assert!(registry.describe(&TypeKey::new("Cache")).unwrap().is_unmarked());
/// assert!(registry.describe(&TypeKey::new("Unknown")).is_err());
/// ```
#[derive(Default)]
pub struct ScopeRegistry {
    entries: FastMap<TypeKey, ScopeMetadata>,
}

impl ScopeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self { entries: new_map() }
    }

    /// Declares a known type without markers.
    pub fn declare(&mut self, key: impl Into<TypeKey>) -> &mut Self {
        self.entries.entry(key.into()).or_default();
        self
    }

    /// Adds a marker on the type itself.
    pub fn mark(&mut self, key: impl Into<TypeKey>, marker: ScopeMarker) -> &mut Self {
        self.entries.entry(key.into()).or_default().on_type.push(marker);
        self
    }

    /// Adds a marker on the type's static initializer.
    pub fn mark_initializer(&mut self, key: impl Into<TypeKey>, marker: ScopeMarker) -> &mut Self {
        self.entries
            .entry(key.into())
            .or_default()
            .on_initializer
            .push(marker);
        self
    }

    /// Shorthand for `mark(key, ScopeMarker::RequestScoped)`.
    pub fn request_scoped(&mut self, key: impl Into<TypeKey>) -> &mut Self {
        self.mark(key, ScopeMarker::RequestScoped)
    }

    /// Shorthand for `mark(key, ScopeMarker::Singleton)`.
    pub fn singleton(&mut self, key: impl Into<TypeKey>) -> &mut Self {
        self.mark(key, ScopeMarker::Singleton)
    }

    /// Declares `T` under [`TypeKey::of::<T>()`](TypeKey::of) with its hints.
    pub fn register<T: HasScopeHint>(&mut self) -> &mut Self {
        let key = TypeKey::of::<T>();
        self.declare(key.clone());
        if let Some(kind) = T::scope_hint() {
            self.mark(key.clone(), kind.into());
        }
        if let Some(kind) = T::initializer_hint() {
            self.mark_initializer(key, kind.into());
        }
        self
    }

    /// Whether `key` was declared.
    pub fn contains(&self, key: &TypeKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of declared keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was declared.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl MetadataSource for ScopeRegistry {
    fn describe(&self, key: &TypeKey) -> DiResult<ScopeMetadata> {
        self.entries
            .get(key)
            .cloned()
            .ok_or_else(|| DiError::UnresolvableScope(key.to_string()))
    }
}

impl fmt::Debug for ScopeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeRegistry")
            .field("declared", &self.entries.len())
            .finish()
    }
}

/// Turns declared markers into a scope decision.
///
/// Priority, highest first:
/// 1. markers on the type itself;
/// 2. markers on its static initializer;
/// 3. no marker at all: request-scoped when classified from inside a request
///    lineage, global otherwise.
///
/// Within one marker site a `RequestScoped` marker beats a `Singleton` one.
pub struct ScopeClassifier {
    source: Box<dyn MetadataSource>,
}

impl ScopeClassifier {
    /// Wraps a metadata source.
    pub fn new(source: impl MetadataSource + 'static) -> Self {
        Self {
            source: Box::new(source),
        }
    }

    /// Classifies a named type.
    ///
    /// `in_request` is whether the classifying unit belongs to a request
    /// lineage; it only matters for unmarked types. Errors from the metadata
    /// source are returned unchanged.
    pub fn classify(&self, key: &TypeKey, in_request: bool) -> DiResult<ScopeKind> {
        let metadata = self.source.describe(key)?;
        Ok(Self::decide(&metadata.on_type)
            .or_else(|| Self::decide(&metadata.on_initializer))
            .unwrap_or_else(|| ScopeKind::from_request_flag(in_request)))
    }

    /// Classifies an ad hoc callable (a factory binding rather than a type).
    ///
    /// Factory-produced values are assumed request-bound; outside a request
    /// lineage the resolver degrades them to globals anyway.
    #[inline]
    pub fn classify_callable(&self) -> ScopeKind {
        ScopeKind::RequestScoped
    }

    fn decide(markers: &[ScopeMarker]) -> Option<ScopeKind> {
        if markers.contains(&ScopeMarker::RequestScoped) {
            Some(ScopeKind::RequestScoped)
        } else if markers.contains(&ScopeMarker::Singleton) {
            Some(ScopeKind::Global)
        } else {
            None
        }
    }
}

impl fmt::Debug for ScopeClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeClassifier").finish_non_exhaustive()
    }
}
