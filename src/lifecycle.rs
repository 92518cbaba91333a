//! Lifecycle management: where does an instance live?
//!
//! The [`LifecycleManager`] is the single point of truth for instance
//! placement. It owns the process-wide instance table and the scope decision
//! cache, reads and writes request-scoped instances through the caller's
//! [`UnitContext`], and implements the resolve-or-create algorithm every
//! container lookup goes through.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::classifier::{MetadataSource, ScopeClassifier};
use crate::config::ScopeOptions;
use crate::internal::{new_map, FastMap, Lock, RwLock, ResolutionGuard};
use crate::lifetime::{ScopeKind, Tier};
use crate::observer::Observers;
use crate::storage::{AnyArc, ScopedStorage, UnitContext, REQUEST_FLAG_KEY};
use crate::{DiError, DiResult, TypeKey};

/// What is being resolved: a named type, or a value produced by a callable
/// bound in the container. Callables the metadata source cannot describe are
/// classified as request-scoped instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Origin {
    Type,
    Callable,
}

enum Lookup {
    Hit(AnyArc),
    Create(Tier),
}

/// Decides and remembers where instances of each key live.
///
/// # Resolution
///
/// [`resolve`](Self::resolve) runs, in order:
/// 1. a global instance for the key wins immediately;
/// 2. the cached scope decision is read, or computed once and cached;
/// 3. request-scoped and inside a request lineage: the unit context is
///    consulted, and filled from the factory on a miss;
/// 4. otherwise the factory's instance is published to the global table.
///
/// Step 4 also covers request-scoped keys resolved outside any request
/// lineage (startup code, background jobs): with no request to scope into,
/// they behave as global singletons on that path.
///
/// Synchronous creation of a global is serialized per key: threads racing
/// for the same missing global wait for the first one's factory instead of
/// running their own. A factory that resolves a key already being resolved
/// further up on the same thread fails with [`DiError::Circular`].
///
/// # Examples
///
/// ```
/// use lineage_di::{LifecycleManager, ScopeRegistry, ScopedStorage};
/// use std::sync::Arc;
///
/// let mut registry = ScopeRegistry::new();
/// registry.request_scoped("RequestId");
///
/// let storage = ScopedStorage::new();
/// let lifecycle = LifecycleManager::new(registry, &storage);
///
/// let request = storage.enter();
/// lifecycle.mark_request_unit(&request);
///
/// let a = lifecycle.resolve(&request, &"RequestId".into(), || Ok(Arc::new(1u64))).unwrap();
/// let b = lifecycle.resolve(&request, &"RequestId".into(), || Ok(Arc::new(2u64))).unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// assert!(lifecycle.get_global(&"RequestId".into()).is_none());
/// ```
pub struct LifecycleManager {
    globals: RwLock<FastMap<TypeKey, AnyArc>>,
    decisions: RwLock<FastMap<TypeKey, ScopeKind>>,
    gates: Lock<FastMap<TypeKey, Arc<Lock<()>>>>,
    classifier: ScopeClassifier,
    observers: Observers,
    report_failures: bool,
}

impl LifecycleManager {
    /// Creates a manager classifying through `source`, reporting to the
    /// observers of `storage`.
    pub fn new(source: impl MetadataSource + 'static, storage: &ScopedStorage) -> Self {
        Self::with_options(source, storage, &ScopeOptions::default())
    }

    /// Like [`new`](Self::new) with explicit options.
    pub fn with_options(
        source: impl MetadataSource + 'static,
        storage: &ScopedStorage,
        options: &ScopeOptions,
    ) -> Self {
        Self {
            globals: RwLock::new(new_map()),
            decisions: RwLock::new(new_map()),
            gates: Lock::new(new_map()),
            classifier: ScopeClassifier::new(source),
            observers: storage.observers().clone(),
            report_failures: options.report_failures,
        }
    }

    /// Global instance for `key`, if one was created or registered.
    pub fn get_global(&self, key: &TypeKey) -> Option<AnyArc> {
        self.globals.read().get(key).cloned()
    }

    /// Stores `instance` as the global instance for `key`, replacing any
    /// previous one. This is the explicit re-bind path; resolution never
    /// overwrites an existing global.
    pub fn set_global(&self, key: TypeKey, instance: AnyArc) {
        self.globals.write().insert(key, instance);
    }

    /// Request-scoped instance for `key` in `unit`'s context.
    pub fn get_request(&self, unit: &UnitContext, key: &TypeKey) -> Option<AnyArc> {
        unit.get(key.as_str())
    }

    /// Stores `instance` for `key` in `unit`'s context.
    pub fn set_request(&self, unit: &UnitContext, key: &TypeKey, instance: AnyArc) {
        unit.set(key.as_str(), instance);
    }

    /// Whether `unit` belongs to a request lineage. Unset means no.
    pub fn is_request_unit(&self, unit: &UnitContext) -> bool {
        unit.get_as::<bool>(REQUEST_FLAG_KEY).is_some_and(|flag| *flag)
    }

    /// Flags `unit` as the root of a request lineage.
    ///
    /// Call this once, at the request boundary (e.g. right after accepting a
    /// connection), before dispatching work. Units spawned from `unit` through
    /// the sanctioned path inherit the flag.
    pub fn mark_request_unit(&self, unit: &UnitContext) {
        unit.set_value(REQUEST_FLAG_KEY, true);
        self.observers.request_marked(unit.id());
    }

    /// Records the scope decision for `key`.
    ///
    /// The first recorded decision sticks; later calls for the same key are
    /// ignored, keeping decisions stable for the life of the manager.
    pub fn cache_lifecycle(&self, key: TypeKey, is_request_scoped: bool) {
        self.decisions
            .write()
            .entry(key)
            .or_insert(ScopeKind::from_request_flag(is_request_scoped));
    }

    /// Cached decision for `key`: `Some(true)` for request-scoped,
    /// `Some(false)` for global, `None` when not decided yet.
    pub fn get_cached_lifecycle(&self, key: &TypeKey) -> Option<bool> {
        self.decisions.read().get(key).map(|kind| kind.is_request_scoped())
    }

    /// Scope of `key`, classifying and caching it on first use.
    ///
    /// A failed classification is returned to the caller and not cached.
    pub fn scope_of(&self, unit: &UnitContext, key: &TypeKey) -> DiResult<ScopeKind> {
        self.decide(unit, key, Origin::Type)
    }

    /// Resolves `key` from the right tier, creating it with `factory` on a miss.
    ///
    /// The factory is invoked at most once per call, outside every table
    /// lock, and its instance is stored only when it returns `Ok`. Factory
    /// and classification errors are returned unchanged; nothing is retried.
    ///
    /// For a global, the factory runs while holding that key's creation gate,
    /// so concurrent callers get the instance it produced. A factory that
    /// (directly or through other factories) resolves its own key fails with
    /// [`DiError::Circular`] instead of recursing.
    pub fn resolve<F>(&self, unit: &UnitContext, key: &TypeKey, factory: F) -> DiResult<AnyArc>
    where
        F: FnOnce() -> DiResult<AnyArc>,
    {
        self.resolve_as(unit, key, Origin::Type, factory)
    }

    /// Async counterpart of [`resolve`](Self::resolve).
    ///
    /// No lock is held across the factory's await points, so async creation
    /// is neither gated nor cycle-checked. If another task publishes the same
    /// global key while this factory runs, the first stored instance is
    /// returned and this one is dropped.
    pub async fn resolve_async<F, Fut>(
        &self,
        unit: &UnitContext,
        key: &TypeKey,
        factory: F,
    ) -> DiResult<AnyArc>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = DiResult<AnyArc>>,
    {
        self.resolve_async_as(unit, key, Origin::Type, factory).await
    }

    pub(crate) fn resolve_as<F>(
        &self,
        unit: &UnitContext,
        key: &TypeKey,
        origin: Origin,
        factory: F,
    ) -> DiResult<AnyArc>
    where
        F: FnOnce() -> DiResult<AnyArc>,
    {
        let _resolving = ResolutionGuard::enter(key).map_err(|e| self.failed(key, e))?;
        let tier = match self.lookup(unit, key, origin)? {
            Lookup::Hit(instance) => return Ok(instance),
            Lookup::Create(tier) => tier,
        };
        if tier == Tier::Request {
            return self.create(unit, key, tier, factory);
        }

        let gate = self.gate(key);
        let _creating = gate.lock();
        // Published by the thread this one waited on.
        if let Some(global) = self.get_global(key) {
            return Ok(global);
        }
        self.create(unit, key, tier, factory)
    }

    pub(crate) async fn resolve_async_as<F, Fut>(
        &self,
        unit: &UnitContext,
        key: &TypeKey,
        origin: Origin,
        factory: F,
    ) -> DiResult<AnyArc>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = DiResult<AnyArc>>,
    {
        let tier = match self.lookup(unit, key, origin)? {
            Lookup::Hit(instance) => return Ok(instance),
            Lookup::Create(tier) => tier,
        };
        let start = self.observers.has_observers().then(Instant::now);
        let instance = factory().await.map_err(|e| self.failed(key, e))?;
        Ok(self.store(unit, key, tier, instance, elapsed_since(start)))
    }

    /// Keys with a cached decision, sorted, with their kinds.
    pub fn decisions(&self) -> Vec<(TypeKey, ScopeKind)> {
        let mut out: Vec<_> = self
            .decisions
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Keys present in the global table, sorted.
    pub fn global_keys(&self) -> Vec<TypeKey> {
        let mut keys: Vec<_> = self.globals.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn gate(&self, key: &TypeKey) -> Arc<Lock<()>> {
        self.gates.lock().entry(key.clone()).or_default().clone()
    }

    fn create<F>(
        &self,
        unit: &UnitContext,
        key: &TypeKey,
        tier: Tier,
        factory: F,
    ) -> DiResult<AnyArc>
    where
        F: FnOnce() -> DiResult<AnyArc>,
    {
        let start = self.observers.has_observers().then(Instant::now);
        let instance = factory().map_err(|e| self.failed(key, e))?;
        Ok(self.store(unit, key, tier, instance, elapsed_since(start)))
    }

    fn lookup(&self, unit: &UnitContext, key: &TypeKey, origin: Origin) -> DiResult<Lookup> {
        if let Some(global) = self.get_global(key) {
            return Ok(Lookup::Hit(global));
        }

        let kind = self.decide(unit, key, origin)?;
        if kind.is_request_scoped() && self.is_request_unit(unit) {
            if let Some(existing) = self.get_request(unit, key) {
                return Ok(Lookup::Hit(existing));
            }
            return Ok(Lookup::Create(Tier::Request));
        }
        Ok(Lookup::Create(Tier::Global))
    }

    fn decide(&self, unit: &UnitContext, key: &TypeKey, origin: Origin) -> DiResult<ScopeKind> {
        if let Some(kind) = self.decisions.read().get(key) {
            return Ok(*kind);
        }

        // Classify under the write lock so each key is classified exactly once.
        let kind = {
            let mut decisions = self.decisions.write();
            if let Some(kind) = decisions.get(key) {
                return Ok(*kind);
            }
            let in_request = self.is_request_unit(unit);
            let kind = match (self.classifier.classify(key, in_request), origin) {
                (Ok(kind), _) => kind,
                // A bound callable with no declared markers of its own.
                (Err(DiError::UnresolvableScope(_)), Origin::Callable) => {
                    self.classifier.classify_callable()
                }
                (Err(e), _) => {
                    drop(decisions);
                    return Err(self.failed(key, e));
                }
            };
            decisions.insert(key.clone(), kind);
            kind
        };
        self.observers.classified(key, kind);
        Ok(kind)
    }

    fn store(
        &self,
        unit: &UnitContext,
        key: &TypeKey,
        tier: Tier,
        instance: AnyArc,
        elapsed: Duration,
    ) -> AnyArc {
        let stored = match tier {
            Tier::Request => unit.get_or_set(key.as_str(), || instance),
            Tier::Global => self
                .globals
                .write()
                .entry(key.clone())
                .or_insert(instance)
                .clone(),
        };
        self.observers.created(key, tier, elapsed);
        stored
    }

    pub(crate) fn failed(&self, key: &TypeKey, error: DiError) -> DiError {
        if self.report_failures {
            self.observers.resolve_failed(key, &error);
        }
        error
    }
}

fn elapsed_since(start: Option<Instant>) -> Duration {
    start.map(|s| s.elapsed()).unwrap_or_default()
}

impl fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("globals", &self.globals.read().len())
            .field("decisions", &self.decisions.read().len())
            .finish()
    }
}
