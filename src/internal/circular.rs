//! Dependency cycle detection for synchronous resolution.
//!
//! Every key being resolved on a thread is pushed onto a thread-local stack
//! for the duration of its resolution. A factory that re-enters resolution
//! for a key already on the stack has closed a cycle.

use std::cell::RefCell;

use crate::{DiError, DiResult, TypeKey};

const MAX_DEPTH: usize = 1024;

thread_local! {
    static RESOLVING: RefCell<Vec<TypeKey>> = const { RefCell::new(Vec::new()) };
}

/// Keeps `key` on the resolution stack until dropped.
pub(crate) struct ResolutionGuard {
    key: TypeKey,
}

impl ResolutionGuard {
    /// Pushes `key`, failing with [`DiError::Circular`] (carrying the path)
    /// when it is already being resolved on this thread.
    pub(crate) fn enter(key: &TypeKey) -> DiResult<Self> {
        RESOLVING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.contains(key) {
                let mut path: Vec<String> = stack.iter().map(ToString::to_string).collect();
                path.push(key.to_string());
                return Err(DiError::Circular(path));
            }
            if stack.len() >= MAX_DEPTH {
                return Err(DiError::DepthExceeded(stack.len()));
            }
            stack.push(key.clone());
            Ok(Self { key: key.clone() })
        })
    }
}

impl Drop for ResolutionGuard {
    fn drop(&mut self) {
        RESOLVING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(last) = stack.pop() {
                debug_assert_eq!(last, self.key);
            }
        });
    }
}
