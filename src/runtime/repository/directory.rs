use std::{
    fs,
    path::{Path, PathBuf},
};

use super::{
    ModuleContent, ModuleLocation, ModuleRepository, RepositoryError, SOURCE_EXTENSION,
    SourceHandle,
};
use crate::runtime::module_id::ModuleId;

/// Modules stored as `<root>/src/<module path>.loam`.
#[derive(Debug, Clone)]
pub struct FileSystemRepository {
    root: PathBuf,
    identity: String,
}

impl FileSystemRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let identity = format!("dir:{}", root.display());
        Self { root, identity }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn source_dir(&self) -> PathBuf {
        self.root.join("src")
    }

    pub fn module_file(&self, path: &ModuleId) -> PathBuf {
        let mut file = self.source_dir();
        for segment in path.segments() {
            file.push(segment);
        }
        file.set_extension(SOURCE_EXTENSION);
        file
    }

    fn walk(
        &self,
        dir: &Path,
        prefix: &mut Vec<String>,
        selector: &dyn Fn(&ModuleId) -> bool,
        found: &mut Vec<ModuleId>,
    ) -> Result<(), RepositoryError> {
        let read_failed = |err| RepositoryError::read(&self.identity, &dir.display().to_string(), err);
        for entry in fs::read_dir(dir).map_err(read_failed)? {
            let entry = entry.map_err(read_failed)?;
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                continue;
            };

            // Symlinked directories are not followed.
            if entry.file_type().map_err(read_failed)?.is_dir() {
                prefix.push(name);
                self.walk(&path, prefix, selector, found)?;
                prefix.pop();
                continue;
            }

            let Some(stem) = name.strip_suffix(&format!(".{SOURCE_EXTENSION}")) else {
                continue;
            };
            let segments = prefix.iter().map(String::as_str).chain(std::iter::once(stem));
            // Files whose names are not valid segments are not modules.
            match ModuleId::from_segments(segments) {
                Ok(id) if selector(&id) => found.push(id),
                _ => {}
            }
        }
        Ok(())
    }
}

impl ModuleRepository for FileSystemRepository {
    fn identify(&self) -> &str {
        &self.identity
    }

    fn locate(&self, path: &ModuleId) -> Result<Option<ModuleLocation>, RepositoryError> {
        let file = self.module_file(path);
        if !file.is_file() {
            return Ok(None);
        }
        Ok(Some(ModuleLocation {
            repository: self.identity.clone(),
            source_name: file.display().to_string(),
            content: ModuleContent::Source(SourceHandle::File(file)),
        }))
    }

    fn collect_modules(
        &self,
        selector: &dyn Fn(&ModuleId) -> bool,
    ) -> Result<Vec<ModuleId>, RepositoryError> {
        let source_dir = self.source_dir();
        let mut found = Vec::new();
        if source_dir.is_dir() {
            self.walk(&source_dir, &mut Vec::new(), selector, &mut found)?;
        }
        found.sort();
        Ok(found)
    }
}
