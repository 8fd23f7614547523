//! Module repositories.
//!
//! A repository maps logical module paths to content: source text to be
//! compiled, or a prebuilt module. Repositories are read-only views; the
//! [`RepositoryChain`] queries them in precedence order and the first one
//! that knows a path wins.

use std::{fs, io, path::PathBuf, sync::Arc};

use thiserror::Error;

use crate::{
    diagnostics::{ErrorCode, INVALID_MANIFEST, REPOSITORY_READ_FAILED},
    runtime::{module::PrebuiltModule, module_id::ModuleId},
};

mod bootstrap;
mod chain;
mod directory;
mod resource;

pub use bootstrap::{BASE_MODULE, BootstrapRepository, KERNEL_MODULE};
pub use chain::RepositoryChain;
pub use directory::FileSystemRepository;
pub use resource::{
    ArchiveResources, EmbeddedResources, MANIFEST_RESOURCE, Manifest, MapResources,
    ResourceRepository, ResourceSource,
};

/// Extension of module source files.
pub const SOURCE_EXTENSION: &str = "loam";

pub trait ModuleRepository: Send + Sync {
    /// Stable description used in diagnostics, e.g. `dir:/opt/lib`.
    fn identify(&self) -> &str;

    /// `Ok(None)` when this repository does not know `path`.
    fn locate(&self, path: &ModuleId) -> Result<Option<ModuleLocation>, RepositoryError>;

    /// Every module this repository can provide that `selector` accepts,
    /// sorted.
    fn collect_modules(
        &self,
        selector: &dyn Fn(&ModuleId) -> bool,
    ) -> Result<Vec<ModuleId>, RepositoryError>;
}

#[derive(Debug, Clone)]
pub struct ModuleLocation {
    /// Identity of the repository that produced this location.
    pub repository: String,
    /// File path or resource name, used for diagnostics and coverage.
    pub source_name: String,
    pub content: ModuleContent,
}

#[derive(Debug, Clone)]
pub enum ModuleContent {
    Source(SourceHandle),
    Prebuilt(Arc<PrebuiltModule>),
}

/// Raw module source, read lazily.
#[derive(Debug, Clone)]
pub enum SourceHandle {
    File(PathBuf),
    Bytes(Arc<[u8]>),
}

impl SourceHandle {
    pub fn read(&self, repository: &str, source_name: &str) -> Result<String, RepositoryError> {
        let bytes = match self {
            SourceHandle::File(path) => {
                fs::read(path).map_err(|err| RepositoryError::read(repository, source_name, err))?
            }
            SourceHandle::Bytes(bytes) => bytes.to_vec(),
        };
        String::from_utf8(bytes).map_err(|err| {
            RepositoryError::read(
                repository,
                source_name,
                io::Error::new(io::ErrorKind::InvalidData, err),
            )
        })
    }
}

#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    #[error("{}", REPOSITORY_READ_FAILED.format(&[resource.as_str(), repository.as_str(), cause.to_string().as_str()]))]
    Read {
        repository: String,
        resource: String,
        #[source]
        cause: Arc<io::Error>,
    },
    #[error("{}", INVALID_MANIFEST.format(&[origin.as_str(), reason.as_str()]))]
    InvalidManifest { origin: String, reason: String },
}

impl RepositoryError {
    pub(crate) fn read(repository: &str, resource: &str, cause: io::Error) -> Self {
        RepositoryError::Read {
            repository: repository.to_string(),
            resource: resource.to_string(),
            cause: Arc::new(cause),
        }
    }

    pub(crate) fn manifest(origin: &str, reason: impl Into<String>) -> Self {
        RepositoryError::InvalidManifest {
            origin: origin.to_string(),
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> &'static ErrorCode {
        match self {
            RepositoryError::Read { .. } => &REPOSITORY_READ_FAILED,
            RepositoryError::InvalidManifest { .. } => &INVALID_MANIFEST,
        }
    }
}

#[cfg(test)]
mod repository_test;
