use std::sync::Arc;

use crate::util::NameMap;
use crate::val::{Scope, ScopeCell, Value};

/// Chained name table for the tree-walking evaluator. Backed by the same
/// scope cells the VM uses, so closures created during discovery capture it
/// directly.
#[derive(Debug, Clone)]
pub struct Environment {
    scope: Scope,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        Self {
            scope: ScopeCell::new(None),
        }
    }

    /// Child scope whose misses fall through to `outer`.
    pub fn enclosed(outer: &Environment) -> Self {
        Self {
            scope: ScopeCell::new(Some(outer.scope.clone())),
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.scope.lookup(name)
    }

    /// Binds in this scope, shadowing outer bindings.
    pub fn set(&self, name: impl Into<Arc<str>>, value: Value) -> Value {
        self.scope.define(name.into(), value.clone());
        value
    }

    /// Overwrites the nearest existing binding, or binds locally when none
    /// exists.
    pub fn assign(&self, name: &Arc<str>, value: Value) -> Value {
        if !self.scope.assign_existing(name, &value) {
            self.scope.define(name.clone(), value.clone());
        }
        value
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Every visible binding; inner scopes win.
    pub fn all(&self) -> NameMap<Value> {
        let mut chain = Vec::new();
        let mut cur = Some(&self.scope);
        while let Some(scope) = cur {
            chain.push(scope);
            cur = scope.parent();
        }
        let mut out = NameMap::default();
        for scope in chain.into_iter().rev() {
            out.extend(scope.snapshot());
        }
        out
    }
}
