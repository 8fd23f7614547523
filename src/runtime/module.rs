use std::sync::Arc;

use crate::{
    runtime::{module_id::ModuleId, value::Value},
    trie::{PersistentSet, PersistentTrie},
};

pub type Bindings = PersistentTrie<Arc<str>, Value>;

/// One fully loaded module. Immutable once published by the loader.
#[derive(Debug, Clone)]
pub struct ModuleInstance {
    id: ModuleId,
    source_name: String,
    namespace: Bindings,
    provided: PersistentSet<Arc<str>>,
    dependencies: Vec<ModuleId>,
    docs: Option<String>,
}

impl ModuleInstance {
    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    /// Where the module came from: a file path, an archive resource or a
    /// builtin marker.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Every binding the module defined or imported.
    pub fn namespace(&self) -> &Bindings {
        &self.namespace
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.namespace.get(name)
    }

    pub fn provided(&self) -> &PersistentSet<Arc<str>> {
        &self.provided
    }

    /// The bindings visible to modules that require this one.
    pub fn exports(&self) -> Bindings {
        self.namespace.select_keys(self.provided.iter())
    }

    pub fn dependencies(&self) -> &[ModuleId] {
        &self.dependencies
    }

    pub fn docs(&self) -> Option<&str> {
        self.docs.as_deref()
    }
}

/// Namespace under construction while a module or script body runs.
///
/// Owned by exactly one evaluation; the loader turns it into a
/// [`ModuleInstance`] when the body completes.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    bindings: Bindings,
    defined: PersistentSet<Arc<str>>,
    provided: Vec<Arc<str>>,
    dependencies: Vec<ModuleId>,
    docs: Option<String>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a namespace from existing bindings (the top level).
    pub fn with_bindings(bindings: Bindings) -> Self {
        Self {
            bindings,
            ..Self::default()
        }
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn define(&mut self, name: &str, value: Value) {
        let name: Arc<str> = Arc::from(name);
        self.defined = self.defined.insert(Arc::clone(&name));
        self.bindings = self.bindings.insert(name, value);
    }

    pub fn provide(&mut self, name: &str) {
        if !self.provided.iter().any(|known| &**known == name) {
            self.provided.push(Arc::from(name));
        }
    }

    pub fn set_docs(&mut self, docs: &str) {
        self.docs = Some(docs.to_string());
    }

    /// Brings the exports of `module` into scope and records the dependency.
    pub fn import(&mut self, module: &ModuleInstance) {
        let exports = module.exports();
        self.bindings = self.bindings.merge_with(
            exports
                .iter()
                .map(|(name, value)| (Arc::clone(name), value.clone())),
            |_, incoming| incoming,
        );
        if !self.dependencies.contains(module.id()) {
            self.dependencies.push(module.id().clone());
        }
    }

    /// Seals the namespace. A module without any `provide` exports every
    /// binding it defined itself; otherwise each provided name must be bound.
    pub fn into_instance(
        self,
        id: ModuleId,
        source_name: String,
    ) -> Result<ModuleInstance, String> {
        let provided = if self.provided.is_empty() {
            self.defined
        } else {
            if let Some(missing) = self
                .provided
                .iter()
                .find(|name| !self.bindings.contains_key(&***name))
            {
                return Err(format!("provided name `{missing}` is not defined"));
            }
            self.provided.into_iter().collect()
        };

        Ok(ModuleInstance {
            id,
            source_name,
            namespace: self.bindings,
            provided,
            dependencies: self.dependencies,
            docs: self.docs,
        })
    }
}

/// Module content supplied natively instead of as source, such as the
/// bootstrap kernel.
#[derive(Debug, Clone, Default)]
pub struct PrebuiltModule {
    bindings: Vec<(Arc<str>, Value)>,
    docs: Option<String>,
}

impl PrebuiltModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(mut self, name: &str, value: Value) -> Self {
        self.bindings.push((Arc::from(name), value));
        self
    }

    pub fn docs(mut self, docs: &str) -> Self {
        self.docs = Some(docs.to_string());
        self
    }

    pub(crate) fn instantiate(&self, id: ModuleId, source_name: String) -> ModuleInstance {
        let namespace: Bindings = self.bindings.iter().cloned().collect();
        ModuleInstance {
            id,
            source_name,
            provided: namespace.keys().cloned().collect(),
            namespace,
            dependencies: Vec::new(),
            docs: self.docs.clone(),
        }
    }
}

#[cfg(test)]
mod module_test;
