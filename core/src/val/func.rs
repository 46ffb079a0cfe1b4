use std::fmt;
use std::sync::{Arc, RwLock};

use crate::util::{NameMap, fast_hash_map_new, read_lock, write_lock};

use super::{Record, Value};

/// Host-native callable. Receives positional arguments, returns one value.
pub type NativeFn = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

/// Built-in method bound to a receiver at lookup time.
pub type Method = fn(&Value, &[Value]) -> Value;

/// A node of the lexical scope chain shared between a frame and the closures
/// it creates.
pub struct ScopeCell {
    vars: RwLock<NameMap<Value>>,
    parent: Option<Scope>,
}

pub type Scope = Arc<ScopeCell>;

impl ScopeCell {
    pub fn new(parent: Option<Scope>) -> Scope {
        Arc::new(Self {
            vars: RwLock::new(fast_hash_map_new()),
            parent,
        })
    }

    pub fn parent(&self) -> Option<&Scope> {
        self.parent.as_ref()
    }

    /// Reads a name from this node only.
    pub fn get_local(&self, name: &str) -> Option<Value> {
        read_lock(&self.vars).get(name).cloned()
    }

    /// Reads a name from this node or any ancestor.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut cur = Some(self);
        while let Some(scope) = cur {
            if let Some(v) = scope.get_local(name) {
                return Some(v);
            }
            cur = scope.parent.as_deref();
        }
        None
    }

    /// Overwrites an existing binding somewhere along the chain.
    /// Returns `false` when no node binds `name`.
    pub fn assign_existing(&self, name: &str, value: &Value) -> bool {
        let mut cur = Some(self);
        while let Some(scope) = cur {
            let mut vars = write_lock(&scope.vars);
            if let Some(slot) = vars.get_mut(name) {
                *slot = value.clone();
                return true;
            }
            drop(vars);
            cur = scope.parent.as_deref();
        }
        false
    }

    pub fn define(&self, name: Arc<str>, value: Value) {
        let mut vars = write_lock(&self.vars);
        match vars.get_mut(&*name) {
            Some(slot) => *slot = value,
            None => {
                vars.insert(name, value);
            }
        }
    }

    pub fn len(&self) -> usize {
        read_lock(&self.vars).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears the bindings in place and relinks the parent. Only reachable
    /// through `Arc::get_mut`, i.e. when no closure holds this scope.
    pub fn reset(&mut self, parent: Option<Scope>) {
        self.vars.get_mut().unwrap_or_else(std::sync::PoisonError::into_inner).clear();
        self.parent = parent;
    }

    pub fn snapshot(&self) -> NameMap<Value> {
        read_lock(&self.vars).clone()
    }
}

impl fmt::Debug for ScopeCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("len", &self.len())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

/// Script function: an entry address into the shared instruction buffer plus
/// the scope it closes over. Descriptors stored in the constant pool have no
/// scope; the VM instantiates a capturing copy every time it pushes one.
#[derive(Clone)]
pub struct Lambda {
    pub address: usize,
    pub params: Arc<[Arc<str>]>,
    pub scope: Option<Scope>,
}

impl Lambda {
    /// Address of a function literal that has no compiled body, e.g. one
    /// produced by an evaluator running without bytecode.
    pub const UNBOUND: usize = usize::MAX;

    pub fn is_bound(&self) -> bool {
        self.address != Self::UNBOUND
    }

    pub fn descriptor(address: usize, params: Vec<Arc<str>>) -> Self {
        Self {
            address,
            params: params.into(),
            scope: None,
        }
    }

    pub fn capture(&self, scope: Scope) -> Self {
        Self {
            address: self.address,
            params: self.params.clone(),
            scope: Some(scope),
        }
    }
}

impl fmt::Debug for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<lambda @{} ({})>", self.address, self.params.join(", "))
    }
}

/// Everything a `Func` value can hold.
pub enum Callable {
    Native(NativeFn),
    Method {
        name: &'static str,
        method: Method,
        receiver: Value,
    },
    RecordMethod {
        record: Arc<dyn Record>,
        name: Arc<str>,
    },
    Lambda(Lambda),
}

impl Callable {
    pub fn as_lambda(&self) -> Option<&Lambda> {
        match self {
            Callable::Lambda(l) => Some(l),
            _ => None,
        }
    }

    /// Calls anything that does not need a VM. Lambdas yield `Invalid`.
    pub fn call_native(&self, args: &[Value]) -> Value {
        match self {
            Callable::Native(f) => f(args),
            Callable::Method { method, receiver, .. } => method(receiver, args),
            Callable::RecordMethod { record, name } => record.call_method(name, args),
            Callable::Lambda(_) => Value::invalid_because("script function needs a VM to run"),
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Native(_) => f.write_str("<native>"),
            Callable::Method { name, receiver, .. } => write!(f, "<method {}.{}>", receiver.kind(), name),
            Callable::RecordMethod { record, name } => write!(f, "<method {}.{}>", record.type_name(), name),
            Callable::Lambda(l) => l.fmt(f),
        }
    }
}
