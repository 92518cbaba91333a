//! Diagnostic observers for scope decisions and context propagation.
//!
//! Observers receive structured events whenever the engine classifies a key,
//! creates an instance in a tier, fails a resolution or propagates context to
//! a spawned unit. They are the crate's logging surface: plug in
//! [`LoggingObserver`] during development, [`TracingObserver`] (with the
//! `tracing` feature) in services, or your own implementation.

use std::sync::Arc;
use std::time::Duration;

use crate::internal::RwLock;
use crate::lifetime::{ScopeKind, Tier};
use crate::storage::UnitId;
use crate::{DiError, TypeKey};

/// Observer trait for scoping-engine events.
///
/// # Performance
///
/// Observer calls are made synchronously on the resolving unit. Keep
/// implementations lightweight; queue expensive work elsewhere.
///
/// # Examples
///
/// ```
/// use lineage_di::{ScopeObserver, ScopeKind, Tier, TypeKey, DiError, UnitId};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct CountingObserver {
///     created: AtomicUsize,
/// }
///
/// impl ScopeObserver for CountingObserver {
///     fn classified(&self, _key: &TypeKey, _kind: ScopeKind) {}
///
///     fn created(&self, _key: &TypeKey, _tier: Tier, _duration: Duration) {
///         self.created.fetch_add(1, Ordering::Relaxed);
///     }
///
///     fn resolve_failed(&self, key: &TypeKey, error: &DiError) {
///         eprintln!("{} failed: {}", key, error);
///     }
/// }
/// ```
pub trait ScopeObserver: Send + Sync {
    /// Called once per key, when its scope decision is computed and cached.
    fn classified(&self, key: &TypeKey, kind: ScopeKind);

    /// Called after a factory returned and its instance was stored.
    ///
    /// # Arguments
    ///
    /// * `key` - The key the instance is stored under
    /// * `tier` - Where the instance was stored
    /// * `duration` - Time spent inside the factory
    fn created(&self, key: &TypeKey, tier: Tier, duration: Duration);

    /// Called when classification or the factory failed for `key`.
    fn resolve_failed(&self, key: &TypeKey, error: &DiError);

    /// Called when a child unit was created through the sanctioned spawn path.
    fn unit_spawned(&self, parent: UnitId, child: UnitId) {
        let _ = (parent, child);
    }

    /// Called when a unit asked to inherit from a unit that is no longer live.
    fn inheritance_skipped(&self, unit: UnitId, source: UnitId) {
        let _ = (unit, source);
    }

    /// Called when a unit is flagged as the root of a request lineage.
    fn request_marked(&self, unit: UnitId) {
        let _ = unit;
    }
}

/// Shared, append-only set of observers.
///
/// One set is owned by a [`ScopedStorage`](crate::ScopedStorage) and shared
/// with every container built on top of it, so registering an observer on the
/// container also reports storage events.
#[derive(Clone, Default)]
pub(crate) struct Observers {
    list: Arc<RwLock<Vec<Arc<dyn ScopeObserver>>>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&self, observer: Arc<dyn ScopeObserver>) {
        self.list.write().push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.list.read().is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.list.read().len()
    }

    // Snapshot so observer callbacks never run under the list lock.
    fn each(&self, f: impl Fn(&dyn ScopeObserver)) {
        let observers: Vec<_> = self.list.read().iter().cloned().collect();
        for observer in &observers {
            f(observer.as_ref());
        }
    }

    pub(crate) fn classified(&self, key: &TypeKey, kind: ScopeKind) {
        self.each(|o| o.classified(key, kind));
    }

    pub(crate) fn created(&self, key: &TypeKey, tier: Tier, duration: Duration) {
        self.each(|o| o.created(key, tier, duration));
    }

    pub(crate) fn resolve_failed(&self, key: &TypeKey, error: &DiError) {
        self.each(|o| o.resolve_failed(key, error));
    }

    pub(crate) fn unit_spawned(&self, parent: UnitId, child: UnitId) {
        self.each(|o| o.unit_spawned(parent, child));
    }

    pub(crate) fn inheritance_skipped(&self, unit: UnitId, source: UnitId) {
        self.each(|o| o.inheritance_skipped(unit, source));
    }

    pub(crate) fn request_marked(&self, unit: UnitId) {
        self.each(|o| o.request_marked(unit));
    }
}

/// Simple observer that prints events to stdout/stderr.
///
/// Useful during development. For production, use [`TracingObserver`] or
/// implement [`ScopeObserver`] against your own logging stack.
///
/// # Examples
///
/// ```
/// use lineage_di::{Container, LoggingObserver, ScopeRegistry, ScopedStorage};
/// use std::sync::Arc;
///
/// let container = Container::new(ScopeRegistry::new(), ScopedStorage::new());
/// container.add_observer(Arc::new(LoggingObserver::with_prefix("[app-di]")));
/// ```
pub struct LoggingObserver {
    prefix: String,
}

impl LoggingObserver {
    /// Creates a logging observer with the default prefix.
    pub fn new() -> Self {
        Self {
            prefix: "[lineage-di]".to_string(),
        }
    }

    /// Creates a logging observer with a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeObserver for LoggingObserver {
    fn classified(&self, key: &TypeKey, kind: ScopeKind) {
        println!("{} Classified: {} as {:?}", self.prefix, key, kind);
    }

    fn created(&self, key: &TypeKey, tier: Tier, duration: Duration) {
        println!("{} Created: {} in {:?} tier ({:?})", self.prefix, key, tier, duration);
    }

    fn resolve_failed(&self, key: &TypeKey, error: &DiError) {
        eprintln!("{} FAILED {}: {}", self.prefix, key, error);
    }

    fn unit_spawned(&self, parent: UnitId, child: UnitId) {
        println!("{} Spawned: {} -> {}", self.prefix, parent, child);
    }

    fn inheritance_skipped(&self, unit: UnitId, source: UnitId) {
        eprintln!("{} {} found nothing to inherit from {}", self.prefix, unit, source);
    }

    fn request_marked(&self, unit: UnitId) {
        println!("{} Request lineage begins at {}", self.prefix, unit);
    }
}

/// Observer that forwards events to the `tracing` ecosystem.
///
/// Decisions and creations are `debug` events, failures `warn`, spawn
/// propagation `trace`. Every event carries the key or unit ids as fields.
#[cfg(feature = "tracing")]
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

#[cfg(feature = "tracing")]
impl ScopeObserver for TracingObserver {
    fn classified(&self, key: &TypeKey, kind: ScopeKind) {
        tracing::debug!(key = %key, kind = ?kind, "scope decision cached");
    }

    fn created(&self, key: &TypeKey, tier: Tier, duration: Duration) {
        tracing::debug!(
            key = %key,
            tier = ?tier,
            elapsed_us = duration.as_micros() as u64,
            "instance created"
        );
    }

    fn resolve_failed(&self, key: &TypeKey, error: &DiError) {
        tracing::warn!(key = %key, error = %error, "resolution failed");
    }

    fn unit_spawned(&self, parent: UnitId, child: UnitId) {
        tracing::trace!(parent = %parent, child = %child, "unit spawned with inherited context");
    }

    fn inheritance_skipped(&self, unit: UnitId, source: UnitId) {
        tracing::warn!(unit = %unit, source = %source, "source unit not live, nothing inherited");
    }

    fn request_marked(&self, unit: UnitId) {
        tracing::debug!(unit = %unit, "request lineage marked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl ScopeObserver for Recorder {
        fn classified(&self, key: &TypeKey, kind: ScopeKind) {
            self.events.lock().unwrap().push(format!("classified {} {:?}", key, kind));
        }

        fn created(&self, key: &TypeKey, tier: Tier, _duration: Duration) {
            self.events.lock().unwrap().push(format!("created {} {:?}", key, tier));
        }

        fn resolve_failed(&self, key: &TypeKey, _error: &DiError) {
            self.events.lock().unwrap().push(format!("failed {}", key));
        }
    }

    #[test]
    fn observers_fan_out_in_registration_order() {
        let observers = Observers::new();
        assert!(!observers.has_observers());

        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        observers.add(first.clone());
        observers.add(second.clone());
        assert_eq!(observers.len(), 2);

        let key = TypeKey::new("Cache");
        observers.classified(&key, ScopeKind::Global);
        observers.created(&key, Tier::Global, Duration::from_millis(1));

        for recorder in [&first, &second] {
            let events = recorder.events.lock().unwrap();
            assert_eq!(events.as_slice(), ["classified Cache Global", "created Cache Global"]);
        }
    }

    #[test]
    fn clones_share_the_same_list() {
        let observers = Observers::new();
        let shared = observers.clone();
        shared.add(Arc::new(LoggingObserver::new()));
        assert!(observers.has_observers());
    }
}
