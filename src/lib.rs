//! # lineage-di
//!
//! Dependency injection where every instance is either process-global or
//! scoped to a single request, and the request scope follows the request
//! through every task it spawns.
//!
//! ## Features
//!
//! - **Two scopes**: `Global` (one instance per process) and `RequestScoped`
//!   (one instance per request lineage)
//! - **Declarative markers**: scopes come from a [`ScopeRegistry`] or the
//!   [`HasScopeHint`] trait; unmarked types are inferred from where they are
//!   first resolved
//! - **Cached decisions**: each key is classified at most once
//! - **Lineage inheritance**: units spawned through [`UnitContext::spawn`] or
//!   [`UnitContext::run_child`] start with a snapshot of the parent's context,
//!   request-scoped instances included
//! - **No ambient state**: the current unit is an explicit [`UnitContext`]
//!   handle passed down the call chain
//!
//! ## Quick Start
//!
//! ```rust
//! use lineage_di::{Container, ScopeRegistry, ScopedStorage};
//! use std::sync::Arc;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! struct RequestLog {
//!     lines: std::sync::Mutex<Vec<String>>,
//! }
//!
//! // Declare scopes once at startup
//! let mut registry = ScopeRegistry::new();
//! registry.singleton("Database").request_scoped("RequestLog");
//!
//! let container = Container::new(registry, ScopedStorage::new());
//!
//! // A request boundary: a fresh unit flagged as a request root
//! let request = container.storage().enter();
//! container.begin_request(&request);
//!
//! let db = container
//!     .make(&request, "Database", || Ok(Database { url: "postgres://localhost".into() }))
//!     .unwrap();
//! let log = container
//!     .make(&request, "RequestLog", || Ok(RequestLog { lines: Default::default() }))
//!     .unwrap();
//!
//! // Child units see the request's instances
//! request.run_child(|child| {
//!     let same = container
//!         .make(child, "RequestLog", || Ok(RequestLog { lines: Default::default() }))
//!         .unwrap();
//!     assert!(Arc::ptr_eq(&log, &same));
//! });
//! assert_eq!(db.url, "postgres://localhost");
//! ```
//!
//! ## Spawning
//!
//! With the default `async` feature, [`UnitContext::spawn`] starts a tokio task
//! in a child unit. The child's context is a snapshot taken before `spawn`
//! returns: writes the parent makes afterwards are never seen by the child.
//!
//! ```rust
//! # #[cfg(feature = "async")]
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! use lineage_di::{Container, ScopeRegistry, ScopedStorage};
//!
//! let mut registry = ScopeRegistry::new();
//! registry.request_scoped("TraceId");
//! let container = std::sync::Arc::new(Container::new(registry, ScopedStorage::new()));
//!
//! let request = container.storage().enter();
//! container.begin_request(&request);
//! let trace = container.make(&request, "TraceId", || Ok(String::from("t-42"))).unwrap();
//!
//! let c = container.clone();
//! let seen = request
//!     .spawn(move |child| async move {
//!         c.make(&child, "TraceId", || Ok(String::from("other"))).unwrap()
//!     })
//!     .await
//!     .unwrap();
//! assert_eq!(*seen, *trace);
//! # }
//! # #[cfg(not(feature = "async"))]
//! # fn main() {}
//! ```
//!
//! ## Cargo features
//!
//! - `async` (default): tokio task spawning with context inheritance
//! - `config`: JSON (de)serialization of [`ScopeOptions`]
//! - `tracing`: [`TracingObserver`]
//! - `diagnostics`: [`Container::to_debug_string`]
//! - `parking-lot`, `ahash`, `performance`: faster locks and maps

pub mod classifier;
pub mod config;
pub mod container;
pub mod error;
pub mod key;
pub mod lifecycle;
pub mod lifetime;
pub mod observer;
pub mod storage;

// Internal modules
mod internal;

// Re-export core types
pub use classifier::{HasScopeHint, MetadataSource, ScopeClassifier, ScopeMetadata, ScopeRegistry};
pub use config::ScopeOptions;
pub use container::{AsyncFactory, Binding, Container, FactoryFn};
pub use error::{DiError, DiResult};
pub use key::{key_of_type, TypeKey};
pub use lifecycle::LifecycleManager;
pub use lifetime::{ScopeKind, ScopeMarker, Tier};
pub use observer::{LoggingObserver, ScopeObserver};
pub use storage::{AnyArc, ScopedStorage, UnitContext, UnitId, REQUEST_FLAG_KEY};

#[cfg(feature = "tracing")]
pub use observer::TracingObserver;
