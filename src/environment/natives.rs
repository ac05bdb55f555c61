//! Host natives registered per module

use crate::interpreter::callable::NativeFunction;
use indexmap::IndexMap;
use std::collections::BTreeMap;

/// Native functions keyed by the module that exposes them
///
/// A registered module is executable even without a script file: its
/// natives are bound into a fresh module context during `load_natives`.
#[derive(Debug, Clone, Default)]
pub struct NativeRegistry {
    modules: BTreeMap<String, IndexMap<String, NativeFunction>>,
}

impl NativeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a native in a module
    pub fn register(&mut self, module: &str, func: NativeFunction) {
        self.modules
            .entry(module.to_string())
            .or_default()
            .insert(func.name().to_string(), func);
    }

    pub fn contains_module(&self, module: &str) -> bool {
        self.modules.contains_key(module)
    }

    /// Registered module names, sorted
    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// Natives of one module in registration order
    pub fn bindings(&self, module: &str) -> Vec<(String, NativeFunction)> {
        self.modules
            .get(module)
            .map(|natives| {
                natives
                    .iter()
                    .map(|(name, func)| (name.clone(), func.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}
