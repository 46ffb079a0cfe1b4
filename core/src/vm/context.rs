use std::sync::Arc;

use crate::util::{NameMap, fast_hash_map_new, sorted_keys};
use crate::val::Value;

/// Host-provided bindings consulted after locals and module variables.
///
/// Built once by the host and shared read-only (behind an `Arc`) by every VM
/// and by the discovery evaluator.
#[derive(Debug, Clone, Default)]
pub struct Globals {
    vars: NameMap<Value>,
}

impl Globals {
    pub fn new() -> Self {
        Self {
            vars: fast_hash_map_new(),
        }
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Binds `name`, returning the value it replaced.
    pub fn insert(&mut self, name: impl Into<Arc<str>>, value: Value) -> Option<Value> {
        self.vars.insert(name.into(), value)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.vars.remove(name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Bound names in sorted order.
    pub fn names(&self) -> Vec<Arc<str>> {
        sorted_keys(&self.vars)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Arc<str>, &Value)> {
        self.vars.iter()
    }

    pub fn into_shared(self) -> Arc<Globals> {
        Arc::new(self)
    }
}

impl<K: Into<Arc<str>>> FromIterator<(K, Value)> for Globals {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut globals = Globals::new();
        for (k, v) in iter {
            globals.insert(k, v);
        }
        globals
    }
}
