//! Binding table entries.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use super::Container;
use crate::storage::{AnyArc, UnitContext};
use crate::{DiResult, TypeKey};

/// Type-erased factory stored in a [`Binding::Factory`].
///
/// Factories receive the container and the resolving unit, so they can pull
/// their own dependencies through [`Container::make_bound`].
pub type FactoryFn = Arc<dyn Fn(&Container, &UnitContext) -> DiResult<AnyArc> + Send + Sync>;

/// What a key is bound to.
#[derive(Clone)]
pub enum Binding {
    /// Another key; resolved transitively
    Alias(TypeKey),
    /// Callable producing the instance on first resolution in its tier
    Factory(FactoryFn),
    /// Pre-built instance returned as-is on first resolution in its tier
    Value(AnyArc),
}

impl Binding {
    /// Alias to `target`.
    pub fn alias(target: impl Into<TypeKey>) -> Self {
        Binding::Alias(target.into())
    }

    /// Typed factory.
    ///
    /// ```
    /// use lineage_di::{Binding, Container, ScopeRegistry, ScopedStorage};
    ///
    /// struct Greeter(String);
    ///
    /// let container = Container::new(ScopeRegistry::new(), ScopedStorage::new());
    /// container.bind("Greeter", Binding::factory(|_, _| Ok(Greeter("hi".into()))));
    ///
    /// let unit = container.storage().enter();
    /// let greeter = container.make_bound::<Greeter>(&unit, "Greeter").unwrap();
    /// assert_eq!(greeter.0, "hi");
    /// ```
    pub fn factory<T, F>(factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Container, &UnitContext) -> DiResult<T> + Send + Sync + 'static,
    {
        Binding::Factory(Arc::new(move |container, unit| {
            factory(container, unit).map(|value| Arc::new(value) as AnyArc)
        }))
    }

    /// Pre-built value.
    pub fn value<T: Any + Send + Sync>(value: T) -> Self {
        Binding::Value(Arc::new(value))
    }

    /// Alias target, if this is an alias.
    pub fn as_alias(&self) -> Option<&TypeKey> {
        match self {
            Binding::Alias(target) => Some(target),
            _ => None,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Binding::Alias(_) => "alias",
            Binding::Factory(_) => "factory",
            Binding::Value(_) => "value",
        }
    }
}

impl From<TypeKey> for Binding {
    fn from(target: TypeKey) -> Self {
        Binding::Alias(target)
    }
}

impl From<&str> for Binding {
    fn from(target: &str) -> Self {
        Binding::Alias(target.into())
    }
}

impl From<String> for Binding {
    fn from(target: String) -> Self {
        Binding::Alias(target.into())
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Alias(target) => f.debug_tuple("Alias").field(target).finish(),
            Binding::Factory(_) => f.write_str("Factory(<fn>)"),
            Binding::Value(_) => f.write_str("Value(<instance>)"),
        }
    }
}

/// Factory creating instances asynchronously.
///
/// Use it for instances whose construction awaits something: opening a
/// connection pool, fetching a remote config, warming a cache.
///
/// # Examples
///
/// ```
/// use lineage_di::{AsyncFactory, Container, DiResult, ScopeRegistry, ScopedStorage, UnitContext};
/// use async_trait::async_trait;
///
/// struct Pool {
///     url: String,
/// }
///
/// struct PoolFactory {
///     url: String,
/// }
///
/// #[async_trait]
/// impl AsyncFactory<Pool> for PoolFactory {
///     async fn create(&self, _unit: &UnitContext) -> DiResult<Pool> {
///         tokio::time::sleep(std::time::Duration::from_millis(1)).await;
///         Ok(Pool { url: self.url.clone() })
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mut registry = ScopeRegistry::new();
/// registry.singleton("Pool");
/// let container = Container::new(registry, ScopedStorage::new());
/// let unit = container.storage().enter();
///
/// let factory = PoolFactory { url: "postgres://localhost".into() };
/// let pool = container.make_async::<Pool, _>(&unit, "Pool", factory).await.unwrap();
/// assert_eq!(pool.url, "postgres://localhost");
/// # }
/// ```
#[async_trait]
pub trait AsyncFactory<T: Send + Sync + 'static>: Send + Sync {
    /// Creates the instance. `unit` is the resolving unit.
    async fn create(&self, unit: &UnitContext) -> DiResult<T>;
}

#[async_trait]
impl<T, F, Fut> AsyncFactory<T> for F
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = DiResult<T>> + Send,
{
    async fn create(&self, _unit: &UnitContext) -> DiResult<T> {
        self().await
    }
}
