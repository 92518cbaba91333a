//! Walks through how scope decisions and request lineages interact,
//! printing each step. Runs without the `async` feature.
//!
//! ```text
//! cargo run --example lineage_walkthrough
//! ```

use lineage_di::{
    Binding, Container, DiResult, LoggingObserver, ScopeRegistry, ScopedStorage, TypeKey,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct Cache {
    generation: u32,
}

fn main() -> DiResult<()> {
    let generations = Arc::new(AtomicU32::new(0));
    let next_cache = {
        let generations = generations.clone();
        move || -> DiResult<Cache> {
            Ok(Cache {
                generation: generations.fetch_add(1, Ordering::SeqCst) + 1,
            })
        }
    };

    let mut registry = ScopeRegistry::new();
    registry.request_scoped("Cache").singleton("Settings");
    let container = Container::new(registry, ScopedStorage::new());
    container.add_observer(Arc::new(LoggingObserver::new()));
    container
        .bind("cache", "Cache")
        .bind("Settings", Binding::value(String::from("region=eu")));

    println!("== two request lineages, each with a child unit");
    for n in 1..=2 {
        let request = container.storage().enter();
        container.begin_request(&request);
        let root = container.make(&request, "cache", next_cache.clone())?;
        let child = request.run_child(|child| container.make(child, "Cache", next_cache.clone()))?;
        println!(
            "request {}: root sees generation {}, child sees generation {}",
            n, root.generation, child.generation
        );
    }

    println!("== outside any request, Cache degrades to a global");
    let startup = container.storage().enter();
    let global = container.make(&startup, "Cache", next_cache.clone())?;
    println!("startup sees generation {}", global.generation);

    let late = container.storage().enter();
    container.begin_request(&late);
    let from_late = container.make(&late, "Cache", next_cache)?;
    println!(
        "a request started afterwards sees generation {} (the global wins)",
        from_late.generation
    );

    let settings = container.make_bound::<String>(&startup, "Settings")?;
    println!("settings: {}", settings);

    let decisions = container.lifecycle().decisions();
    println!("== cached decisions");
    for (key, kind) in decisions {
        println!("  {:<10} {:?}", key.as_str(), kind);
    }
    println!(
        "globals: {:?}",
        container
            .lifecycle()
            .global_keys()
            .iter()
            .map(TypeKey::as_str)
            .collect::<Vec<_>>()
    );
    Ok(())
}
