//! Internal implementation details.

pub(crate) mod circular;
pub(crate) mod map;
pub(crate) mod sync;

pub(crate) use circular::ResolutionGuard;
pub(crate) use map::{new_map, FastMap};
pub(crate) use sync::{Lock, RwLock};
