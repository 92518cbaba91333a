//! Spawning tokio tasks as child units.

use std::future::Future;

use tokio::task::JoinHandle;

use super::{ScopedStorage, UnitContext, UnitId};

impl ScopedStorage {
    /// Spawns `entry` as a tokio task running in a child unit of `parent`.
    ///
    /// The child's context is copied from the parent synchronously, before
    /// this function returns and before the task is first polled. The task
    /// owns the child handle, so the child context lives exactly as long as
    /// the task's future.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F, Fut>(&self, parent: UnitId, entry: F) -> JoinHandle<Fut::Output>
    where
        F: FnOnce(UnitContext) -> Fut,
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        let child = self.fork(parent);
        tokio::spawn(entry(child))
    }
}

impl UnitContext {
    /// Spawns `entry` as a tokio task in a child unit inheriting this
    /// unit's context.
    ///
    /// This is the sanctioned way to fan work out inside a request: the
    /// child sees every request-scoped instance the parent has created so far
    /// and the request-lineage flag.
    ///
    /// ```
    /// use lineage_di::ScopedStorage;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let storage = ScopedStorage::new();
    /// let parent = storage.enter();
    /// parent.set_value("request_id", "req-7".to_string());
    ///
    /// let handle = parent.spawn(|child| async move {
    ///     child.get_as::<String>("request_id").map(|id| id.to_string())
    /// });
    ///
    /// assert_eq!(handle.await.unwrap().as_deref(), Some("req-7"));
    /// # }
    /// ```
    pub fn spawn<F, Fut>(&self, entry: F) -> JoinHandle<Fut::Output>
    where
        F: FnOnce(UnitContext) -> Fut,
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        self.storage().spawn(self.id(), entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawned_child_inherits_snapshot_taken_at_spawn() {
        let storage = ScopedStorage::new();
        let parent = storage.enter();
        parent.set_value("before", 1u8);

        let handle = parent.spawn(|child| async move {
            tokio::task::yield_now().await;
            (child.has("before"), child.has("after"))
        });
        parent.set_value("after", 2u8);

        assert_eq!(handle.await.unwrap(), (true, false));
    }

    #[tokio::test]
    async fn child_unit_ends_with_its_task() {
        let storage = ScopedStorage::new();
        let parent = storage.enter();
        let child_id = parent.spawn(|child| async move { child.id() }).await.unwrap();
        assert!(!storage.is_live(child_id));
        assert!(storage.is_live(parent.id()));
    }
}
