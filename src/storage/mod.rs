//! Execution-unit-local storage with explicit parent to child inheritance.
//!
//! Every execution unit (a tokio task, or an inline child run) owns one
//! [`UnitContext`]: a private key/value map. A unit created through the
//! sanctioned spawn path starts with a snapshot of its parent's map; any other
//! unit starts empty. Request-scoped instances and the request-lineage flag
//! live in these maps, which is how they follow a request through its whole
//! tree of tasks.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::ScopeOptions;
use crate::internal::{new_map, FastMap, Lock, RwLock};
use crate::observer::Observers;

mod unit;
#[cfg(feature = "async")]
mod spawn;

pub use unit::UnitContext;

/// Type-erased shared value stored in contexts and instance tables.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// Reserved context key flagging a unit as part of a request lineage.
pub const REQUEST_FLAG_KEY: &str = "is_request_coroutine";

pub(crate) type ContextMap = FastMap<String, AnyArc>;
pub(crate) type SharedContext = Arc<Lock<ContextMap>>;

/// Identifier of an execution unit, unique per [`ScopedStorage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(u64);

impl UnitId {
    /// Raw numeric id.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit#{}", self.0)
    }
}

/// Registry of live execution units and their contexts.
///
/// `ScopedStorage` is a cheap handle (`Clone` shares the registry). It hands
/// out [`UnitContext`]s and keeps a weak view of which units are still live so
/// that a child can copy from its parent by id. A unit is deregistered when
/// its context handle is dropped.
///
/// # Examples
///
/// ```
/// use lineage_di::ScopedStorage;
/// use std::sync::Arc;
///
/// let storage = ScopedStorage::new();
/// let root = storage.enter();
/// root.set("trace_id", Arc::new("t-1".to_string()));
///
/// // Sanctioned child: starts with a snapshot of the parent's context
/// let seen = root.run_child(|child| child.get_as::<String>("trace_id"));
/// assert_eq!(seen.as_deref().map(String::as_str), Some("t-1"));
///
/// // Unsanctioned unit: starts empty
/// let stray = storage.enter();
/// assert!(!stray.has("trace_id"));
/// ```
#[derive(Clone)]
pub struct ScopedStorage {
    inner: Arc<StorageInner>,
}

struct StorageInner {
    units: RwLock<FastMap<UnitId, SharedContext>>,
    next_id: AtomicU64,
    inherit_keys: Vec<String>,
    observers: Observers,
}

impl ScopedStorage {
    /// Creates an empty registry with default options.
    pub fn new() -> Self {
        Self::with_options(&ScopeOptions::default())
    }

    /// Creates an empty registry using `options.inherit_keys` as the default
    /// spawn-inheritance filter.
    pub fn with_options(options: &ScopeOptions) -> Self {
        let mut inherit_keys = options.inherit_keys.clone();
        if !inherit_keys.is_empty() && !inherit_keys.iter().any(|k| k == REQUEST_FLAG_KEY) {
            inherit_keys.push(REQUEST_FLAG_KEY.to_string());
        }
        Self {
            inner: Arc::new(StorageInner {
                units: RwLock::new(new_map()),
                next_id: AtomicU64::new(1),
                inherit_keys,
                observers: Observers::new(),
            }),
        }
    }

    /// Creates a fresh unit with an empty context.
    ///
    /// Use this for root units: startup code, a connection-accept loop, tests.
    ///
    /// # Stale inheritance
    ///
    /// A unit created here inherits nothing, even when it is logically a child
    /// of some request. Request-scoped lookups in it silently degrade to
    /// global instances. Creating request work through `enter` (or through a
    /// bare `tokio::spawn` that captures nothing) instead of
    /// [`UnitContext::spawn`] / [`UnitContext::run_child`] is the easiest way
    /// to leak request state into the global tier.
    pub fn enter(&self) -> UnitContext {
        let (id, map) = self.register();
        UnitContext::new(id, None, self.clone(), map)
    }

    /// Creates a child of `parent` that starts with a snapshot of the parent's
    /// context, filtered by the storage's default inherit keys.
    ///
    /// The snapshot is taken before this returns, so later mutations of the
    /// parent are never observed by the child. A `parent` that is no longer
    /// live yields a child with an empty context.
    pub fn fork(&self, parent: UnitId) -> UnitContext {
        let keys: Vec<&str> = self.inner.inherit_keys.iter().map(String::as_str).collect();
        self.fork_with_keys(parent, &keys)
    }

    /// Like [`fork`](Self::fork) with an explicit key filter (empty = all).
    pub fn fork_with_keys(&self, parent: UnitId, keys: &[&str]) -> UnitContext {
        let (id, map) = self.register();
        let child = UnitContext::new(id, Some(parent), self.clone(), map);
        if child.copy_from(parent, keys) {
            self.inner.observers.unit_spawned(parent, id);
        }
        child
    }

    /// Runs `entry` synchronously in a new child unit of `parent`.
    ///
    /// The child context is dropped (and deregistered) when `entry` returns.
    pub fn run<R>(&self, parent: UnitId, entry: impl FnOnce(&UnitContext) -> R) -> R {
        let child = self.fork(parent);
        entry(&child)
    }

    /// Whether `id` names a unit whose context handle is still alive.
    pub fn is_live(&self, id: UnitId) -> bool {
        self.inner.units.read().contains_key(&id)
    }

    /// Number of live units.
    pub fn live_units(&self) -> usize {
        self.inner.units.read().len()
    }

    pub(crate) fn observers(&self) -> &Observers {
        &self.inner.observers
    }

    pub(crate) fn context_of(&self, id: UnitId) -> Option<SharedContext> {
        self.inner.units.read().get(&id).cloned()
    }

    pub(crate) fn release(&self, id: UnitId) {
        self.inner.units.write().remove(&id);
    }

    fn register(&self) -> (UnitId, SharedContext) {
        let id = UnitId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let map: SharedContext = Arc::new(Lock::new(new_map()));
        self.inner.units.write().insert(id, map.clone());
        (id, map)
    }
}

impl Default for ScopedStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ScopedStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedStorage")
            .field("live_units", &self.live_units())
            .field("inherit_keys", &self.inner.inherit_keys)
            .field("observers", &self.inner.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units_are_deregistered_on_drop() {
        let storage = ScopedStorage::new();
        let unit = storage.enter();
        let id = unit.id();
        assert!(storage.is_live(id));
        assert_eq!(storage.live_units(), 1);

        drop(unit);
        assert!(!storage.is_live(id));
        assert_eq!(storage.live_units(), 0);
    }

    #[test]
    fn fork_of_dead_parent_starts_empty() {
        let storage = ScopedStorage::new();
        let parent = storage.enter();
        parent.set("k", Arc::new(1u8));
        let parent_id = parent.id();
        drop(parent);

        let orphan = storage.fork(parent_id);
        assert!(orphan.is_empty());
        assert_eq!(orphan.parent(), Some(parent_id));
    }

    #[test]
    fn inherit_filter_always_keeps_request_flag() {
        let options = ScopeOptions::default().with_inherit_keys(["trace"]);
        let storage = ScopedStorage::with_options(&options);
        let parent = storage.enter();
        parent.set("trace", Arc::new(7u32));
        parent.set("other", Arc::new(8u32));
        parent.set(REQUEST_FLAG_KEY, Arc::new(true));

        let child = storage.fork(parent.id());
        assert!(child.has("trace"));
        assert!(child.has(REQUEST_FLAG_KEY));
        assert!(!child.has("other"));
    }

    #[test]
    fn ids_are_unique() {
        let storage = ScopedStorage::new();
        let a = storage.enter();
        let b = storage.enter();
        assert_ne!(a.id(), b.id());
        assert_eq!(format!("{}", UnitId(3)), "unit#3");
    }
}
