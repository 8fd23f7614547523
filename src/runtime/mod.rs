//! Module runtime: repositories, the loader and the top level.
//!
//! A [`Runtime`] owns one [`ModuleLoader`](loader::ModuleLoader) over a
//! frozen [`RepositoryChain`](repository::RepositoryChain). Module identity is
//! per runtime: each logical path is instantiated at most once, and the
//! outcome (instance or failure) is kept for the runtime's lifetime.
//! Runtimes are `Send + Sync`; any number of threads may load through one.

use std::{path::PathBuf, sync::Arc, time::Duration};

use crate::coverage::{CoverageError, CoverageSession};

pub mod collaborator;
pub mod forms;
pub mod loader;
pub mod module;
pub mod module_id;
pub mod repository;
pub mod value;

mod builder;
mod top_level;

pub use builder::{
    BootstrapPrecedence, COVERAGE_DATA_DIR_ENV, ConfigError, REPOSITORY_PATH_ENV, RuntimeBuilder,
};
pub use top_level::TopLevel;

use loader::{LoadError, LoadOutcome, ModuleLoader, ModuleState};
use module::{ModuleInstance, PrebuiltModule};
use module_id::ModuleId;
use repository::{BASE_MODULE, RepositoryChain, RepositoryError};
use value::Value;

pub struct Runtime {
    loader: Arc<ModuleLoader>,
    coverage: Option<Arc<CoverageSession>>,
}

impl Runtime {
    pub(crate) fn from_parts(
        loader: Arc<ModuleLoader>,
        coverage: Option<Arc<CoverageSession>>,
    ) -> Self {
        Self { loader, coverage }
    }

    /// Shorthand for [`RuntimeBuilder::forms`].
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::forms()
    }

    pub fn load(&self, path: &ModuleId) -> LoadOutcome {
        self.loader.load(path)
    }

    /// Parses `path` first; bare names such as `greet` mean `/greet`.
    pub fn load_path(&self, path: &str) -> LoadOutcome {
        let id = ModuleId::parse(path)?;
        self.load(&id)
    }

    /// Stops waiting after `timeout`; the load itself runs to completion.
    pub fn load_within(&self, path: &ModuleId, timeout: Duration) -> LoadOutcome {
        self.loader.load_within(path, timeout)
    }

    pub fn lookup(&self, path: &ModuleId) -> Option<Arc<ModuleInstance>> {
        self.loader.lookup(path)
    }

    pub fn state(&self, path: &ModuleId) -> ModuleState {
        self.loader.state(path)
    }

    pub fn loaded_modules(&self) -> Vec<ModuleId> {
        self.loader.loaded_modules()
    }

    pub fn chain(&self) -> &RepositoryChain {
        self.loader.chain()
    }

    pub fn collect_modules(
        &self,
        selector: &dyn Fn(&ModuleId) -> bool,
    ) -> Result<Vec<ModuleId>, RepositoryError> {
        self.chain().collect_modules(selector)
    }

    /// Starts a host-built module that will be published under `path`.
    pub fn module_builder(&self, path: ModuleId) -> ModuleBuilder<'_> {
        ModuleBuilder {
            loader: &self.loader,
            path,
            module: PrebuiltModule::new(),
        }
    }

    /// A top level seeded with the exports of the base library.
    pub fn top_level(&self) -> Result<TopLevel, LoadError> {
        let base = ModuleId::parse_absolute(BASE_MODULE)?;
        self.top_level_with(&base)
    }

    /// A top level seeded with the exports of `initial`.
    pub fn top_level_with(&self, initial: &ModuleId) -> Result<TopLevel, LoadError> {
        let module = self.load(initial)?;
        Ok(TopLevel::new(Arc::clone(&self.loader), module.exports()))
    }

    pub fn empty_top_level(&self) -> TopLevel {
        TopLevel::new(Arc::clone(&self.loader), Default::default())
    }

    /// The recording session, when coverage was configured with a data
    /// directory.
    pub fn coverage(&self) -> Option<&Arc<CoverageSession>> {
        self.coverage.as_ref()
    }

    pub fn flush_coverage(&self) -> Result<Option<PathBuf>, CoverageError> {
        match &self.coverage {
            Some(session) => session.flush(),
            None => Ok(None),
        }
    }
}

/// Builds a module in host code and registers it with a runtime.
pub struct ModuleBuilder<'a> {
    loader: &'a ModuleLoader,
    path: ModuleId,
    module: PrebuiltModule,
}

impl ModuleBuilder<'_> {
    pub fn define(mut self, name: &str, value: Value) -> Self {
        self.module = self.module.define(name, value);
        self
    }

    pub fn docs(mut self, docs: &str) -> Self {
        self.module = self.module.docs(docs);
        self
    }

    /// Publishes the module. Fails if the path already has an instance, a
    /// cached failure or a load in progress.
    pub fn instantiate(self) -> LoadOutcome {
        let instance = self.module.instantiate(self.path, "<host>".to_string());
        self.loader.register(instance)
    }
}
