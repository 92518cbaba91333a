use lineage_di::{Container, ScopeRegistry, ScopedStorage};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct Cache {
    id: u32,
}

fn counting_factory(counter: &Arc<AtomicU32>) -> impl Fn() -> lineage_di::DiResult<Cache> + '_ {
    move || {
        Ok(Cache {
            id: counter.fetch_add(1, Ordering::SeqCst) + 1,
        })
    }
}

fn registry_with(setup: impl FnOnce(&mut ScopeRegistry)) -> ScopeRegistry {
    let mut registry = ScopeRegistry::new();
    setup(&mut registry);
    registry
}

#[test]
fn test_global_identical_across_units() {
    let container = Container::new(
        registry_with(|r| {
            r.singleton("Config");
        }),
        ScopedStorage::new(),
    );
    let counter = Arc::new(AtomicU32::new(0));

    let startup = container.storage().enter();
    let request = container.storage().enter();
    container.begin_request(&request);

    let a = container.make(&startup, "Config", counting_factory(&counter)).unwrap();
    let b = container.make(&request, "Config", counting_factory(&counter)).unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_request_scoped_shared_by_siblings() {
    let container = Container::new(
        registry_with(|r| {
            r.request_scoped("Cache");
        }),
        ScopedStorage::new(),
    );
    let counter = Arc::new(AtomicU32::new(0));

    let parent = container.storage().enter();
    container.begin_request(&parent);
    let inherited = container.make(&parent, "Cache", counting_factory(&counter)).unwrap();

    let left = parent.fork();
    let right = parent.fork();
    let from_left = container.make(&left, "Cache", counting_factory(&counter)).unwrap();
    let from_right = container.make(&right, "Cache", counting_factory(&counter)).unwrap();

    assert!(Arc::ptr_eq(&from_left, &inherited));
    assert!(Arc::ptr_eq(&from_right, &inherited));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_request_scoped_distinct_across_lineages() {
    let container = Container::new(
        registry_with(|r| {
            r.request_scoped("Cache");
        }),
        ScopedStorage::new(),
    );
    let counter = Arc::new(AtomicU32::new(0));

    let first = container.storage().enter();
    container.begin_request(&first);
    let second = container.storage().enter();
    container.begin_request(&second);

    let a = first.run_child(|child| {
        container.make(child, "Cache", counting_factory(&counter)).unwrap()
    });
    let b = second.run_child(|child| {
        container.make(child, "Cache", counting_factory(&counter)).unwrap()
    });

    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!((a.id, b.id), (1, 2));
}

#[test]
fn test_instance_created_in_child_stays_in_child() {
    let container = Container::new(
        registry_with(|r| {
            r.request_scoped("Cache");
        }),
        ScopedStorage::new(),
    );
    let counter = Arc::new(AtomicU32::new(0));

    let parent = container.storage().enter();
    container.begin_request(&parent);

    let in_child = parent.run_child(|child| {
        container.make(child, "Cache", counting_factory(&counter)).unwrap()
    });
    let in_parent = container.make(&parent, "Cache", counting_factory(&counter)).unwrap();

    assert!(!Arc::ptr_eq(&in_child, &in_parent));
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[test]
fn test_request_flag_inherited_only_through_sanctioned_path() {
    let container = Container::new(ScopeRegistry::new(), ScopedStorage::new());
    let parent = container.storage().enter();
    container.begin_request(&parent);

    assert!(parent.run_child(|child| container.is_request_unit(child)));
    assert!(container.is_request_unit(&parent.fork()));

    let stray = container.storage().enter();
    assert!(!container.is_request_unit(&stray));
}

#[test]
fn test_unmarked_cache_outside_requests_is_global() {
    let container = Container::new(
        registry_with(|r| {
            r.declare("Cache");
        }),
        ScopedStorage::new(),
    );
    let counter = Arc::new(AtomicU32::new(0));
    let outside = container.storage().enter();

    let a1 = container.make(&outside, "Cache", counting_factory(&counter)).unwrap();
    let a2 = container.make(&outside, "Cache", counting_factory(&counter)).unwrap();

    assert!(Arc::ptr_eq(&a1, &a2));
    assert_eq!(a1.id, 1);
}

#[test]
fn test_marked_cache_per_request_then_global_wins() {
    let container = Container::new(
        registry_with(|r| {
            r.request_scoped("Cache");
        }),
        ScopedStorage::new(),
    );
    let counter = Arc::new(AtomicU32::new(0));

    // Each request lineage gets its own B
    let r1 = container.storage().enter();
    container.begin_request(&r1);
    let r2 = container.storage().enter();
    container.begin_request(&r2);
    let b1 = container.make(&r1, "Cache", counting_factory(&counter)).unwrap();
    let b2 = container.make(&r2, "Cache", counting_factory(&counter)).unwrap();
    assert!(!Arc::ptr_eq(&b1, &b2));

    // Outside callers get A
    let outside = container.storage().enter();
    let a = container.make(&outside, "Cache", counting_factory(&counter)).unwrap();
    assert!(!Arc::ptr_eq(&a, &b1));
    let again = container.make(&outside, "Cache", counting_factory(&counter)).unwrap();
    assert!(Arc::ptr_eq(&a, &again));

    // Once A is global it wins everywhere, even for new requests
    let r3 = container.storage().enter();
    container.begin_request(&r3);
    let late = container.make(&r3, "Cache", counting_factory(&counter)).unwrap();
    assert!(Arc::ptr_eq(&late, &a));

    // Requests that already held B still see the global first
    assert!(Arc::ptr_eq(&container.make(&r1, "Cache", counting_factory(&counter)).unwrap(), &a));
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}

#[test]
fn test_dropping_request_unit_discards_its_instances() {
    let container = Container::new(
        registry_with(|r| {
            r.request_scoped("Cache");
        }),
        ScopedStorage::new(),
    );
    let counter = Arc::new(AtomicU32::new(0));

    let request = container.storage().enter();
    container.begin_request(&request);
    let instance = container.make(&request, "Cache", counting_factory(&counter)).unwrap();
    let weak = Arc::downgrade(&instance);
    drop(instance);
    assert!(weak.upgrade().is_some());

    drop(request);
    assert!(weak.upgrade().is_none());
    assert_eq!(container.storage().live_units(), 0);
}
