//! Hash map flavour used by every table in the crate.

use std::collections::HashMap;

#[cfg(feature = "ahash")]
pub(crate) type FastMap<K, V> = HashMap<K, V, ahash::RandomState>;

#[cfg(not(feature = "ahash"))]
pub(crate) type FastMap<K, V> = HashMap<K, V>;

#[inline]
pub(crate) fn new_map<K, V>() -> FastMap<K, V> {
    FastMap::default()
}
