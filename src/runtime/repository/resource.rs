use std::{
    collections::{BTreeSet, HashMap},
    fs,
    io::{self, Cursor, Read},
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use super::{
    ModuleContent, ModuleLocation, ModuleRepository, RepositoryError, SOURCE_EXTENSION,
    SourceHandle,
};
use crate::runtime::module_id::ModuleId;

/// Resource holding the repository manifest.
pub const MANIFEST_RESOURCE: &str = "manifest.json";

const MANIFEST_VERSION: u32 = 1;

/// Flat, read-only store of named byte blobs.
pub trait ResourceSource: Send + Sync {
    fn describe(&self) -> String;

    fn read(&self, name: &str) -> Option<Arc<[u8]>>;
}

/// Resources compiled into the binary.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedResources {
    name: &'static str,
    entries: &'static [(&'static str, &'static [u8])],
}

impl EmbeddedResources {
    pub const fn new(name: &'static str, entries: &'static [(&'static str, &'static [u8])]) -> Self {
        Self { name, entries }
    }
}

impl ResourceSource for EmbeddedResources {
    fn describe(&self) -> String {
        format!("embedded:{}", self.name)
    }

    fn read(&self, name: &str) -> Option<Arc<[u8]>> {
        self.entries
            .iter()
            .find(|(entry, _)| *entry == name)
            .map(|(_, bytes)| Arc::from(*bytes))
    }
}

/// In-memory resources, mostly for hosts and tests.
#[derive(Debug, Clone, Default)]
pub struct MapResources {
    name: String,
    entries: HashMap<String, Arc<[u8]>>,
}

impl MapResources {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: HashMap::new(),
        }
    }

    pub fn with(mut self, name: &str, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        self.entries.insert(name.to_string(), Arc::from(bytes));
        self
    }
}

impl ResourceSource for MapResources {
    fn describe(&self) -> String {
        format!("memory:{}", self.name)
    }

    fn read(&self, name: &str) -> Option<Arc<[u8]>> {
        self.entries.get(name).cloned()
    }
}

/// Regular files of a tar archive, read fully when opened.
#[derive(Debug, Clone)]
pub struct ArchiveResources {
    origin: PathBuf,
    entries: HashMap<String, Arc<[u8]>>,
}

impl ArchiveResources {
    pub fn open(path: &Path) -> Result<Self, RepositoryError> {
        let identity = format!("archive:{}", path.display());
        let bytes = fs::read(path)
            .map_err(|err| RepositoryError::read(&identity, &path.display().to_string(), err))?;
        Self::from_bytes(path, bytes)
    }

    pub fn from_bytes(origin: &Path, bytes: Vec<u8>) -> Result<Self, RepositoryError> {
        let identity = format!("archive:{}", origin.display());
        let read_failed = |err| RepositoryError::read(&identity, "tar entries", err);

        let mut entries = HashMap::new();
        let mut archive = tar::Archive::new(Cursor::new(bytes));
        for entry in archive.entries().map_err(read_failed)? {
            let mut entry = entry.map_err(read_failed)?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let name = entry.path().map_err(read_failed)?.to_string_lossy().replace('\\', "/");
            let name = name.trim_start_matches("./").to_string();
            let mut data = Vec::new();
            entry.read_to_end(&mut data).map_err(read_failed)?;
            entries.insert(name, Arc::from(data));
        }

        Ok(Self {
            origin: origin.to_path_buf(),
            entries,
        })
    }
}

impl ResourceSource for ArchiveResources {
    fn describe(&self) -> String {
        format!("archive:{}", self.origin.display())
    }

    fn read(&self, name: &str) -> Option<Arc<[u8]>> {
        self.entries.get(name).cloned()
    }
}

/// Index of the modules a resource repository carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    /// Absolute resource prefix; sources live under `<root>/src`.
    pub root: String,
    pub modules: Vec<ModuleId>,
}

/// Manifest-driven repository over a [`ResourceSource`].
pub struct ResourceRepository {
    identity: String,
    root: String,
    modules: BTreeSet<ModuleId>,
    resources: Box<dyn ResourceSource>,
}

impl ResourceRepository {
    pub fn new(resources: impl ResourceSource + 'static) -> Result<Self, RepositoryError> {
        let identity = resources.describe();
        let bytes = resources.read(MANIFEST_RESOURCE).ok_or_else(|| {
            RepositoryError::manifest(&identity, format!("no `{MANIFEST_RESOURCE}` resource"))
        })?;
        let manifest: Manifest = serde_json::from_slice(&bytes)
            .map_err(|err| RepositoryError::manifest(&identity, err.to_string()))?;

        if manifest.version != MANIFEST_VERSION {
            return Err(RepositoryError::manifest(
                &identity,
                format!("unsupported version {}", manifest.version),
            ));
        }
        if !manifest.root.starts_with('/') {
            return Err(RepositoryError::manifest(
                &identity,
                format!("root `{}` must start with `/`", manifest.root),
            ));
        }

        Ok(Self {
            identity,
            root: manifest.root.trim_end_matches('/').to_string(),
            modules: manifest.modules.into_iter().collect(),
            resources: Box::new(resources),
        })
    }

    pub fn open_archive(path: &Path) -> Result<Self, RepositoryError> {
        Self::new(ArchiveResources::open(path)?)
    }

    /// `<root>/src/<module path>.loam`, without the leading `/`.
    pub fn resource_name(&self, path: &ModuleId) -> String {
        let full = format!("{}/src{}.{}", self.root, path, SOURCE_EXTENSION);
        full.trim_start_matches('/').to_string()
    }
}

impl ModuleRepository for ResourceRepository {
    fn identify(&self) -> &str {
        &self.identity
    }

    fn locate(&self, path: &ModuleId) -> Result<Option<ModuleLocation>, RepositoryError> {
        if !self.modules.contains(path) {
            return Ok(None);
        }
        let name = self.resource_name(path);
        let bytes = self.resources.read(&name).ok_or_else(|| {
            RepositoryError::read(
                &self.identity,
                &name,
                io::Error::new(io::ErrorKind::NotFound, "listed in the manifest but missing"),
            )
        })?;
        Ok(Some(ModuleLocation {
            repository: self.identity.clone(),
            source_name: format!("{}!/{}", self.identity, name),
            content: ModuleContent::Source(SourceHandle::Bytes(bytes)),
        }))
    }

    fn collect_modules(
        &self,
        selector: &dyn Fn(&ModuleId) -> bool,
    ) -> Result<Vec<ModuleId>, RepositoryError> {
        Ok(self.modules.iter().filter(|id| selector(id)).cloned().collect())
    }
}
