use std::sync::Arc;

use anyhow::{Result, anyhow, bail};
use tracing::debug;

use crate::util::{FastHashMap, NameMap, fast_hash_map_new, sorted_keys};
use crate::val::Value;
use crate::vm::Globals;

/// A named table of host values installed into scripts as one Map global.
pub trait Module: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Disabled modules stay registered but are left out of the globals.
    fn enabled(&self) -> bool {
        true
    }

    /// Called once per [`ModuleRegistry::globals`] build, before `exports`.
    fn init(&self) -> Result<()> {
        Ok(())
    }

    fn exports(&self) -> NameMap<Value>;
}

/// Collects modules and loose builtins and turns them into [`Globals`].
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: FastHashMap<Arc<str>, Arc<dyn Module>>,
    builtins: NameMap<Value>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            modules: fast_hash_map_new(),
            builtins: fast_hash_map_new(),
        }
    }

    pub fn register_module(&mut self, module: Arc<dyn Module>) -> Result<()> {
        let name: Arc<str> = Arc::from(module.name());
        if name.is_empty() {
            bail!("module name must not be empty");
        }
        if self.modules.contains_key(&name) {
            bail!("module '{}' is already registered", name);
        }
        self.modules.insert(name, module);
        Ok(())
    }

    /// Binds a global function or value directly, replacing any previous one.
    pub fn register_builtin(&mut self, name: impl Into<Arc<str>>, value: Value) {
        self.builtins.insert(name.into(), value);
    }

    pub fn get_module(&self, name: &str) -> Result<&dyn Module> {
        self.modules
            .get(name)
            .map(|m| m.as_ref())
            .ok_or_else(|| anyhow!("module '{}' not found", name))
    }

    pub fn get_builtin(&self, name: &str) -> Option<&Value> {
        self.builtins.get(name)
    }

    pub fn module_names(&self) -> Vec<Arc<str>> {
        let mut names: Vec<Arc<str>> = self.modules.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn builtin_names(&self) -> Vec<Arc<str>> {
        sorted_keys(&self.builtins)
    }

    /// Builds the global table: each enabled module as a Map under its name,
    /// then every builtin. A builtin may not shadow a module.
    pub fn globals(&self) -> Result<Globals> {
        let mut globals = Globals::new();
        for name in self.module_names() {
            let module = &self.modules[&name];
            if !module.enabled() {
                debug!(target: "kit::module", module = %name, "module disabled");
                continue;
            }
            module.init().map_err(|e| anyhow!("failed to initialize module '{}': {}", name, e))?;
            globals.insert(name, Value::map(module.exports()));
        }
        for (name, value) in &self.builtins {
            if globals.contains(name) {
                bail!("builtin '{}' conflicts with a module of the same name", name);
            }
            globals.insert(name.clone(), value.clone());
        }
        Ok(globals)
    }
}
