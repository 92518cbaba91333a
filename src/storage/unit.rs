//! The per-unit context handle.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::{AnyArc, ScopedStorage, SharedContext, UnitId};

/// Handle to the context of one execution unit.
///
/// The handle is the unit's identity: it is passed explicitly down the call
/// chain (`&UnitContext`) wherever the "current unit" matters, and dropping it
/// ends the unit, discarding its context and every request-scoped instance in
/// it. It is deliberately not `Clone`; children get their own handle through
/// [`spawn`](Self::spawn) or [`run_child`](Self::run_child).
///
/// All accessors take `&self`, so one unit can share its handle between the
/// futures it joins without giving up exclusive ownership of the context.
pub struct UnitContext {
    id: UnitId,
    parent: Option<UnitId>,
    storage: ScopedStorage,
    map: SharedContext,
}

impl UnitContext {
    pub(super) fn new(
        id: UnitId,
        parent: Option<UnitId>,
        storage: ScopedStorage,
        map: SharedContext,
    ) -> Self {
        Self {
            id,
            parent,
            storage,
            map,
        }
    }

    /// This unit's id.
    #[inline]
    pub fn id(&self) -> UnitId {
        self.id
    }

    /// The unit this one was forked from, if any.
    pub fn parent(&self) -> Option<UnitId> {
        self.parent
    }

    /// The storage this unit is registered in.
    pub fn storage(&self) -> &ScopedStorage {
        &self.storage
    }

    /// Value bound to `key`, if any.
    pub fn get(&self, key: &str) -> Option<AnyArc> {
        self.map.lock().get(key).cloned()
    }

    /// Value bound to `key`, or `default` when unbound.
    pub fn get_or(&self, key: &str, default: AnyArc) -> AnyArc {
        self.get(key).unwrap_or(default)
    }

    /// Value bound to `key`, downcast to `T`.
    ///
    /// Returns `None` when unbound or bound to a value of another type.
    pub fn get_as<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.get(key).and_then(|v| v.downcast::<T>().ok())
    }

    /// Binds `key` to `value`, overwriting silently; returns `value`.
    pub fn set(&self, key: impl Into<String>, value: AnyArc) -> AnyArc {
        self.map.lock().insert(key.into(), value.clone());
        value
    }

    /// Typed convenience over [`set`](Self::set).
    pub fn set_value<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) -> Arc<T> {
        let value = Arc::new(value);
        self.map.lock().insert(key.into(), value.clone());
        value
    }

    /// Whether `key` is bound.
    pub fn has(&self, key: &str) -> bool {
        self.map.lock().contains_key(key)
    }

    /// Removes `key`; no-op when absent.
    pub fn delete(&self, key: &str) {
        self.map.lock().remove(key);
    }

    /// Returns the value bound to `key`, binding `make()` first if absent.
    ///
    /// `make` runs outside the context lock, so it may itself use this unit.
    /// If it binds `key` as a side effect, that binding wins.
    pub fn get_or_set(&self, key: &str, make: impl FnOnce() -> AnyArc) -> AnyArc {
        if let Some(existing) = self.get(key) {
            return existing;
        }
        let value = make();
        self.map
            .lock()
            .entry(key.to_string())
            .or_insert(value)
            .clone()
    }

    /// Replaces the value of `key` with `f(current)` and returns the new value.
    pub fn update(&self, key: &str, f: impl FnOnce(Option<AnyArc>) -> AnyArc) -> AnyArc {
        let current = self.get(key);
        self.set(key, f(current))
    }

    /// Drops every entry of this unit's context.
    pub fn clear(&self) {
        self.map.lock().clear();
    }

    /// Number of entries in this unit's context.
    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    /// Whether this unit's context is empty.
    pub fn is_empty(&self) -> bool {
        self.map.lock().is_empty()
    }

    /// Bound keys, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.map.lock().keys().cloned().collect()
    }

    /// Copy of the whole context. Values are shared, the map is not.
    pub fn snapshot(&self) -> HashMap<String, AnyArc> {
        self.map
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Replaces this unit's entire context with a snapshot of `source`'s.
    ///
    /// With an empty `keys` slice everything is copied; otherwise only the
    /// listed keys. Entries of this unit that are not in the filtered snapshot
    /// are dropped: this is a replace, not a merge.
    ///
    /// When `source` is not a live unit nothing happens and `false` is
    /// returned; there is simply nothing to inherit.
    pub fn copy_from(&self, source: UnitId, keys: &[&str]) -> bool {
        let Some(from) = self.storage.context_of(source) else {
            self.storage.observers().inheritance_skipped(self.id, source);
            return false;
        };

        // Snapshot under the source lock only, then swap under ours.
        let snapshot: super::ContextMap = {
            let from = from.lock();
            if keys.is_empty() {
                (*from).clone()
            } else {
                from.iter()
                    .filter(|(k, _)| keys.contains(&k.as_str()))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            }
        };
        *self.map.lock() = snapshot;
        true
    }

    /// Runs `entry` synchronously in a child unit that inherits this
    /// unit's context.
    ///
    /// ```
    /// use lineage_di::ScopedStorage;
    /// use std::sync::Arc;
    ///
    /// let storage = ScopedStorage::new();
    /// let parent = storage.enter();
    /// parent.set("user", Arc::new(42u64));
    ///
    /// parent.run_child(|child| {
    ///     assert_eq!(child.get_as::<u64>("user").as_deref(), Some(&42));
    ///     // Child writes stay in the child
    ///     child.set("scratch", Arc::new(1u8));
    /// });
    /// assert!(!parent.has("scratch"));
    /// ```
    pub fn run_child<R>(&self, entry: impl FnOnce(&UnitContext) -> R) -> R {
        self.storage.run(self.id, entry)
    }

    /// Creates a child unit that inherits this unit's context, without running
    /// anything in it. Hand the returned handle to whatever executes the child.
    pub fn fork(&self) -> UnitContext {
        self.storage.fork(self.id)
    }
}

impl Drop for UnitContext {
    fn drop(&mut self) {
        self.storage.release(self.id);
    }
}

impl fmt::Debug for UnitContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys = self.keys();
        keys.sort();
        f.debug_struct("UnitContext")
            .field("id", &self.id)
            .field("parent", &self.parent)
            .field("keys", &keys)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_set_has_delete() {
        let storage = ScopedStorage::new();
        let unit = storage.enter();

        assert!(unit.get("a").is_none());
        let fallback: AnyArc = Arc::new(0u8);
        assert!(Arc::ptr_eq(&unit.get_or("a", fallback.clone()), &fallback));

        let stored = unit.set("a", Arc::new(1u8));
        assert!(unit.has("a"));
        assert!(Arc::ptr_eq(&unit.get("a").unwrap(), &stored));

        unit.delete("a");
        unit.delete("a");
        assert!(!unit.has("a"));
    }

    #[test]
    fn get_as_rejects_other_types() {
        let storage = ScopedStorage::new();
        let unit = storage.enter();
        unit.set_value("n", 5u32);
        assert_eq!(unit.get_as::<u32>("n").as_deref(), Some(&5));
        assert!(unit.get_as::<String>("n").is_none());
    }

    #[test]
    fn get_or_set_keeps_first_value() {
        let storage = ScopedStorage::new();
        let unit = storage.enter();
        let first = unit.get_or_set("k", || Arc::new(1u8));
        let second = unit.get_or_set("k", || Arc::new(2u8));
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn update_sees_previous_value() {
        let storage = ScopedStorage::new();
        let unit = storage.enter();
        unit.update("count", |old| {
            assert!(old.is_none());
            Arc::new(1u32)
        });
        unit.update("count", |old| {
            let n = old.and_then(|v| v.downcast::<u32>().ok()).map_or(0, |v| *v);
            Arc::new(n + 1)
        });
        assert_eq!(unit.get_as::<u32>("count").as_deref(), Some(&2));
    }

    #[test]
    fn copy_from_replaces_instead_of_merging() {
        let storage = ScopedStorage::new();
        let source = storage.enter();
        source.set_value("a", 1u8);
        source.set_value("b", 2u8);

        let target = storage.enter();
        target.set_value("stale", 9u8);

        assert!(target.copy_from(source.id(), &["a"]));
        assert!(target.has("a"));
        assert!(!target.has("b"));
        assert!(!target.has("stale"));
    }

    #[test]
    fn copy_from_missing_unit_is_noop() {
        let storage = ScopedStorage::new();
        let target = storage.enter();
        target.set_value("keep", 1u8);

        let ghost = storage.enter().id();
        assert!(!target.copy_from(ghost, &[]));
        assert!(target.has("keep"));
    }

    #[test]
    fn child_snapshot_is_independent() {
        let storage = ScopedStorage::new();
        let parent = storage.enter();
        parent.set_value("shared", 1u8);

        let child = parent.fork();
        parent.set_value("late", 2u8);
        child.set_value("own", 3u8);

        assert!(child.has("shared"));
        assert!(!child.has("late"));
        assert!(!parent.has("own"));
        assert!(Arc::ptr_eq(&parent.get("shared").unwrap(), &child.get("shared").unwrap()));
    }
}
