//! The container: bindings plus lifecycle-aware resolution.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use crate::classifier::MetadataSource;
use crate::config::ScopeOptions;
use crate::internal::{new_map, FastMap, RwLock};
use crate::lifecycle::{LifecycleManager, Origin};
use crate::lifetime::Tier;
use crate::observer::ScopeObserver;
use crate::storage::{AnyArc, ScopedStorage, UnitContext};
use crate::{DiError, DiResult, TypeKey};

mod binding;

pub use binding::{AsyncFactory, Binding, FactoryFn};

/// Dependency injection container with request-lineage scoping.
///
/// The container owns the binding table and a [`LifecycleManager`]. Every
/// lookup takes the caller's [`UnitContext`]: that handle is what decides
/// whether a request-scoped instance is visible.
///
/// All methods take `&self`; wrap the container in an `Arc` to share it
/// between tasks.
///
/// # Examples
///
/// ```
/// use lineage_di::{Container, ScopeRegistry, ScopedStorage};
/// use std::sync::Arc;
///
/// struct Config { name: &'static str }
/// struct RequestId(u64);
///
/// let mut registry = ScopeRegistry::new();
/// registry.singleton("Config").request_scoped("RequestId");
///
/// let container = Container::new(registry, ScopedStorage::new());
///
/// let first = container.storage().enter();
/// container.begin_request(&first);
/// let second = container.storage().enter();
/// container.begin_request(&second);
///
/// let c1 = container.make(&first, "Config", || Ok(Config { name: "app" })).unwrap();
/// let c2 = container.make(&second, "Config", || Ok(Config { name: "other" })).unwrap();
/// assert!(Arc::ptr_eq(&c1, &c2));
/// assert_eq!(c2.name, "app");
///
/// let r1 = container.make(&first, "RequestId", || Ok(RequestId(1))).unwrap();
/// let r2 = container.make(&second, "RequestId", || Ok(RequestId(2))).unwrap();
/// assert_eq!((r1.0, r2.0), (1, 2));
/// ```
pub struct Container {
    bindings: RwLock<FastMap<TypeKey, Binding>>,
    lifecycle: LifecycleManager,
    storage: ScopedStorage,
    max_alias_depth: usize,
}

impl Container {
    /// Creates a container classifying through `source`, on top of `storage`.
    pub fn new(source: impl MetadataSource + 'static, storage: ScopedStorage) -> Self {
        Self::with_options(source, storage, &ScopeOptions::default())
    }

    /// Like [`new`](Self::new) with explicit options.
    pub fn with_options(
        source: impl MetadataSource + 'static,
        storage: ScopedStorage,
        options: &ScopeOptions,
    ) -> Self {
        Self {
            bindings: RwLock::new(new_map()),
            lifecycle: LifecycleManager::with_options(source, &storage, options),
            storage,
            max_alias_depth: options.max_alias_depth,
        }
    }

    /// Registers an observer for classification, creation and unit events.
    ///
    /// Observers are shared with the storage, so every container on the same
    /// storage reports to them.
    pub fn add_observer(&self, observer: Arc<dyn ScopeObserver>) {
        self.storage.observers().add(observer);
    }

    /// The storage units are created from.
    pub fn storage(&self) -> &ScopedStorage {
        &self.storage
    }

    /// The lifecycle manager, for direct tier access.
    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    /// Flags `unit` as the root of a request lineage.
    pub fn begin_request(&self, unit: &UnitContext) {
        self.lifecycle.mark_request_unit(unit);
    }

    /// Whether `unit` belongs to a request lineage.
    pub fn is_request_unit(&self, unit: &UnitContext) -> bool {
        self.lifecycle.is_request_unit(unit)
    }

    // ----- Bindings -----

    /// Binds `key` to an alias, factory or value, replacing any earlier binding.
    ///
    /// Aliasing a key to itself is ignored.
    ///
    /// ```
    /// use lineage_di::{Container, ScopeRegistry, ScopedStorage, TypeKey};
    ///
    /// let container = Container::new(ScopeRegistry::new(), ScopedStorage::new());
    /// container.bind("cache", "app::RedisCache").bind("cache_alias", "cache");
    ///
    /// assert_eq!(container.get_alias("cache"), TypeKey::new("app::RedisCache"));
    /// let resolved = container.resolve_alias("cache_alias").unwrap();
    /// assert_eq!(resolved, TypeKey::new("app::RedisCache"));
    /// ```
    pub fn bind(&self, key: impl Into<TypeKey>, target: impl Into<Binding>) -> &Self {
        let key = key.into();
        let target = target.into();
        if target.as_alias() == Some(&key) {
            return self;
        }
        self.bindings.write().insert(key, target);
        self
    }

    /// Binds several keys at once.
    pub fn bind_many<I, K, B>(&self, entries: I) -> &Self
    where
        I: IntoIterator<Item = (K, B)>,
        K: Into<TypeKey>,
        B: Into<Binding>,
    {
        for (key, target) in entries {
            self.bind(key, target);
        }
        self
    }

    /// Whether `key` has a binding of any kind.
    pub fn is_bound(&self, key: impl Into<TypeKey>) -> bool {
        self.bindings.read().contains_key(&key.into())
    }

    /// Follows one level of alias: the alias target of `key`, or `key` itself.
    pub fn get_alias(&self, key: impl Into<TypeKey>) -> TypeKey {
        let key = key.into();
        match self.bindings.read().get(&key) {
            Some(Binding::Alias(target)) => target.clone(),
            _ => key,
        }
    }

    /// Follows aliases until a key that is not an alias.
    ///
    /// A chain that revisits a key fails with [`DiError::AliasCycle`]
    /// (carrying the path); one longer than the configured maximum fails with
    /// [`DiError::DepthExceeded`].
    pub fn resolve_alias(&self, key: impl Into<TypeKey>) -> DiResult<TypeKey> {
        let key = key.into();
        self.follow_aliases(&key)
            .map_err(|e| self.lifecycle.failed(&key, e))
    }

    fn follow_aliases(&self, key: &TypeKey) -> DiResult<TypeKey> {
        let bindings = self.bindings.read();
        let mut current = key.clone();
        let mut path = vec![current.clone()];

        while let Some(next) = bindings.get(&current).and_then(Binding::as_alias) {
            if path.contains(next) {
                path.push(next.clone());
                return Err(DiError::AliasCycle(
                    path.iter().map(ToString::to_string).collect(),
                ));
            }
            if path.len() > self.max_alias_depth {
                return Err(DiError::DepthExceeded(self.max_alias_depth));
            }
            path.push(next.clone());
            current = next.clone();
        }
        Ok(current)
    }

    // ----- Resolution -----

    /// Returns the instance of `key` for `unit`, creating it with `factory`
    /// when the selected tier has none yet.
    ///
    /// `key` is resolved through aliases first. The factory runs at most once
    /// per call and never under a table lock, so it may resolve other keys.
    /// Resolving a key that is already being resolved further up the same
    /// call chain fails with [`DiError::Circular`].
    pub fn make<T, F>(
        &self,
        unit: &UnitContext,
        key: impl Into<TypeKey>,
        factory: F,
    ) -> DiResult<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> DiResult<T>,
    {
        let instance = self.make_any(unit, key, || factory().map(|v| Arc::new(v) as AnyArc))?;
        downcast(instance)
    }

    /// Untyped [`make`](Self::make).
    pub fn make_any<F>(
        &self,
        unit: &UnitContext,
        key: impl Into<TypeKey>,
        factory: F,
    ) -> DiResult<AnyArc>
    where
        F: FnOnce() -> DiResult<AnyArc>,
    {
        let target = self.resolve_alias(key)?;
        self.lifecycle.resolve(unit, &target, factory)
    }

    /// Resolves `key` using what it is bound to.
    ///
    /// Factory and value bindings are classified by the markers declared for
    /// the resolved key; when there are none the instance is treated as
    /// request-scoped. An unbound key only finds instances that already exist.
    pub fn make_bound<T: Any + Send + Sync>(
        &self,
        unit: &UnitContext,
        key: impl Into<TypeKey>,
    ) -> DiResult<Arc<T>> {
        downcast(self.make_bound_any(unit, key)?)
    }

    /// Untyped [`make_bound`](Self::make_bound).
    pub fn make_bound_any(&self, unit: &UnitContext, key: impl Into<TypeKey>) -> DiResult<AnyArc> {
        let key = key.into();
        let target = self.resolve_alias(key.clone())?;
        let binding = self.bindings.read().get(&target).cloned();
        match binding {
            Some(Binding::Factory(factory)) => {
                self.lifecycle
                    .resolve_as(unit, &target, Origin::Callable, || factory(self, unit))
            }
            Some(Binding::Value(value)) => {
                self.lifecycle
                    .resolve_as(unit, &target, Origin::Callable, || Ok(value))
            }
            Some(Binding::Alias(_)) | None => {
                self.lookup(unit, &target).ok_or_else(|| self.not_found(&key))
            }
        }
    }

    /// Async [`make`](Self::make).
    ///
    /// No internal lock is held while the factory is awaited.
    pub async fn make_async<T, F>(
        &self,
        unit: &UnitContext,
        key: impl Into<TypeKey>,
        factory: F,
    ) -> DiResult<Arc<T>>
    where
        T: Any + Send + Sync,
        F: AsyncFactory<T>,
    {
        let target = self.resolve_alias(key)?;
        let instance = self
            .lifecycle
            .resolve_async(unit, &target, || async {
                factory.create(unit).await.map(|v| Arc::new(v) as AnyArc)
            })
            .await?;
        downcast(instance)
    }

    // ----- Direct instance registration -----

    /// Stores `instance` as the global instance of `key`, replacing any
    /// existing one.
    pub fn instance_global<T: Any + Send + Sync>(
        &self,
        key: impl Into<TypeKey>,
        instance: Arc<T>,
    ) -> DiResult<&Self> {
        let target = self.resolve_alias(key)?;
        self.lifecycle.set_global(target, instance);
        Ok(self)
    }

    /// Stores `instance` for `key` in `unit`'s context.
    pub fn instance_request<T: Any + Send + Sync>(
        &self,
        unit: &UnitContext,
        key: impl Into<TypeKey>,
        instance: Arc<T>,
    ) -> DiResult<&Self> {
        let target = self.resolve_alias(key)?;
        self.lifecycle.set_request(unit, &target, instance);
        Ok(self)
    }

    /// Stores a pre-built object under `key`, in the tier its concrete type
    /// is classified into.
    ///
    /// The scope is decided for [`TypeKey::of::<T>()`](TypeKey::of), not for
    /// `key`: binding an object to an interface name keeps the object's own
    /// lifecycle. Returns the tier the object landed in.
    pub fn instance<T: Any + Send + Sync>(
        &self,
        unit: &UnitContext,
        key: impl Into<TypeKey>,
        instance: Arc<T>,
    ) -> DiResult<Tier> {
        let kind = self.lifecycle.scope_of(unit, &TypeKey::of::<T>())?;
        if kind.is_request_scoped() && self.lifecycle.is_request_unit(unit) {
            self.instance_request(unit, key, instance)?;
            Ok(Tier::Request)
        } else {
            self.instance_global(key, instance)?;
            Ok(Tier::Global)
        }
    }

    // ----- Lookup -----

    /// Existing instance of `key`: the global one, else the one in `unit`'s
    /// context. Never creates anything.
    ///
    /// A miss is reported to observers like any other failed resolution.
    pub fn get(&self, unit: &UnitContext, key: impl Into<TypeKey>) -> DiResult<AnyArc> {
        let key = key.into();
        let target = self.resolve_alias(key.clone())?;
        self.lookup(unit, &target).ok_or_else(|| self.not_found(&key))
    }

    /// Typed [`get`](Self::get).
    pub fn get_as<T: Any + Send + Sync>(
        &self,
        unit: &UnitContext,
        key: impl Into<TypeKey>,
    ) -> DiResult<Arc<T>> {
        downcast(self.get(unit, key)?)
    }

    /// Whether [`get`](Self::get) would find an instance.
    pub fn has(&self, unit: &UnitContext, key: impl Into<TypeKey>) -> bool {
        self.follow_aliases(&key.into())
            .map(|target| self.lookup(unit, &target).is_some())
            .unwrap_or(false)
    }

    fn not_found(&self, key: &TypeKey) -> DiError {
        self.lifecycle.failed(key, DiError::NotFound(key.to_string()))
    }

    fn lookup(&self, unit: &UnitContext, key: &TypeKey) -> Option<AnyArc> {
        self.lifecycle
            .get_global(key)
            .or_else(|| self.lifecycle.get_request(unit, key))
    }

    /// Human-readable dump of bindings, scope decisions and global keys.
    #[cfg(feature = "diagnostics")]
    pub fn to_debug_string(&self) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        let mut bindings: Vec<(TypeKey, String)> = self
            .bindings
            .read()
            .iter()
            .map(|(k, b)| {
                let target = match b {
                    Binding::Alias(t) => format!("alias -> {}", t),
                    other => other.kind().to_string(),
                };
                (k.clone(), target)
            })
            .collect();
        bindings.sort();

        let _ = writeln!(out, "Bindings ({}):", bindings.len());
        for (key, target) in &bindings {
            let _ = writeln!(out, "  {} => {}", key, target);
        }

        let decisions = self.lifecycle.decisions();
        let _ = writeln!(out, "Decisions ({}):", decisions.len());
        for (key, kind) in &decisions {
            let _ = writeln!(out, "  {} => {:?}", key, kind);
        }

        let globals = self.lifecycle.global_keys();
        let _ = writeln!(out, "Globals ({}):", globals.len());
        for key in &globals {
            let _ = writeln!(out, "  {}", key);
        }
        out
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bindings = self.bindings.read();
        let mut kinds: Vec<(&TypeKey, &'static str)> =
            bindings.iter().map(|(k, b)| (k, b.kind())).collect();
        kinds.sort();
        f.debug_struct("Container")
            .field("bindings", &kinds)
            .field("lifecycle", &self.lifecycle)
            .field("storage", &self.storage)
            .finish()
    }
}

fn downcast<T: Any + Send + Sync>(instance: AnyArc) -> DiResult<Arc<T>> {
    instance
        .downcast::<T>()
        .map_err(|_| DiError::TypeMismatch(type_name::<T>()))
}
