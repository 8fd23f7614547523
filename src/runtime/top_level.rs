use std::{fs, path::Path, sync::Arc};

use parking_lot::Mutex;

use super::{
    loader::{LoadError, ModuleLoader},
    module::{Bindings, Namespace},
    repository::RepositoryError,
    value::Value,
};

/// A mutable top-level environment for running scripts.
///
/// Bindings defined by a script stay visible to later scripts, including
/// the ones a failing script made before it failed. Scripts on one top level
/// run one at a time.
pub struct TopLevel {
    loader: Arc<ModuleLoader>,
    namespace: Mutex<Namespace>,
}

impl TopLevel {
    pub(crate) fn new(loader: Arc<ModuleLoader>, bindings: Bindings) -> Self {
        Self {
            loader,
            namespace: Mutex::new(Namespace::with_bindings(bindings)),
        }
    }

    /// Runs `text` as a script named `name`, returning the values its
    /// top-level forms produced.
    pub fn eval_source(&self, name: &str, text: &str) -> Result<Vec<Value>, LoadError> {
        let mut namespace = self.namespace.lock();
        self.loader.run_script(name, text, &mut namespace)
    }

    pub fn load_file(&self, path: &Path) -> Result<Vec<Value>, LoadError> {
        let name = path.display().to_string();
        let text = fs::read_to_string(path)
            .map_err(|err| RepositoryError::read("script", &name, err))?;
        self.eval_source(&name, &text)
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.namespace.lock().lookup(name).cloned()
    }

    pub fn define(&self, name: &str, value: Value) {
        self.namespace.lock().define(name, value);
    }

    /// Snapshot of the current bindings.
    pub fn bindings(&self) -> Bindings {
        self.namespace.lock().bindings().clone()
    }
}
