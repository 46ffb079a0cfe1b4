use std::sync::Arc;

pub type FastHashMap<K, V> = rustc_hash::FxHashMap<K, V>;

/// Name-keyed table used for scopes, globals and script maps.
pub type NameMap<V> = FastHashMap<Arc<str>, V>;

#[inline]
pub fn fast_hash_map_new<K, V>() -> FastHashMap<K, V> {
    rustc_hash::FxHashMap::default()
}

#[inline]
pub fn fast_hash_map_with_capacity<K, V>(capacity: usize) -> FastHashMap<K, V> {
    rustc_hash::FxHashMap::with_capacity_and_hasher(capacity, Default::default())
}

/// Keys of a name table in lexical order, so rendering and iteration are stable.
pub fn sorted_keys<V>(map: &NameMap<V>) -> Vec<Arc<str>> {
    let mut keys: Vec<Arc<str>> = map.keys().cloned().collect();
    keys.sort_unstable();
    keys
}
