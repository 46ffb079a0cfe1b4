use std::sync::Arc;

use crate::val::{Scope, ScopeCell, Value};

/// One activation record. Frames live in an arena indexed by call depth and
/// are reused across calls.
pub(super) struct Frame {
    pub(super) ip: usize,
    /// Operand stack height when the frame was entered.
    pub(super) base: usize,
    pub(super) scope: Scope,
    /// Deferred callables in registration order; run back to front.
    pub(super) defers: Vec<Value>,
}

impl Frame {
    pub(super) fn new(ip: usize, base: usize, parent: Option<Scope>) -> Self {
        Self {
            ip,
            base,
            scope: ScopeCell::new(parent),
            defers: Vec::new(),
        }
    }

    /// Prepares a previously used slot for a new call. The old scope is
    /// cleared in place unless a closure still holds it.
    pub(super) fn reenter(&mut self, ip: usize, base: usize, parent: Option<Scope>) {
        self.ip = ip;
        self.base = base;
        self.defers.clear();
        match Arc::get_mut(&mut self.scope) {
            Some(cell) => cell.reset(parent),
            None => self.scope = ScopeCell::new(parent),
        }
    }

    /// Enters with an existing scope, e.g. the module variable table.
    pub(super) fn reenter_with(&mut self, ip: usize, base: usize, scope: Scope) {
        self.ip = ip;
        self.base = base;
        self.defers.clear();
        self.scope = scope;
    }
}
