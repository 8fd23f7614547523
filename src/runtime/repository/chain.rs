use std::{collections::BTreeSet, sync::Arc};

use tracing::debug;

use super::{ModuleLocation, ModuleRepository, RepositoryError};
use crate::runtime::module_id::ModuleId;

/// Repositories in precedence order. Fixed once built.
#[derive(Clone, Default)]
pub struct RepositoryChain {
    repositories: Vec<Arc<dyn ModuleRepository>>,
}

impl RepositoryChain {
    pub fn new(repositories: Vec<Arc<dyn ModuleRepository>>) -> Self {
        Self { repositories }
    }

    pub fn repositories(&self) -> &[Arc<dyn ModuleRepository>] {
        &self.repositories
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    /// Asks each repository in turn; the first that knows `path` wins and
    /// later ones are not consulted.
    pub fn resolve(&self, path: &ModuleId) -> Result<Option<ModuleLocation>, RepositoryError> {
        for repository in &self.repositories {
            if let Some(location) = repository.locate(path)? {
                debug!(module = %path, repository = repository.identify(), "resolved module");
                return Ok(Some(location));
            }
        }
        debug!(module = %path, repositories = self.repositories.len(), "module not found");
        Ok(None)
    }

    /// Identities of the repositories, for diagnostics.
    pub fn describe(&self) -> String {
        if self.repositories.is_empty() {
            return "no repositories configured".to_string();
        }
        self.repositories
            .iter()
            .map(|repository| repository.identify())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Union of the modules every repository offers, sorted.
    pub fn collect_modules(
        &self,
        selector: &dyn Fn(&ModuleId) -> bool,
    ) -> Result<Vec<ModuleId>, RepositoryError> {
        let mut all = BTreeSet::new();
        for repository in &self.repositories {
            all.extend(repository.collect_modules(selector)?);
        }
        Ok(all.into_iter().collect())
    }
}
