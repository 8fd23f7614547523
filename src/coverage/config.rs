use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use super::{CoverageError, UnitKind};
use crate::runtime::module_id::ModuleId;

/// Name of the descriptor inside a coverage data directory.
pub const CONFIG_FILE: &str = "config.json";

/// Which units a coverage data directory cares about.
///
/// A module is in scope when its path equals or is nested under one of
/// `included_modules`; a script when its source name contains one of
/// `included_sources`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoverageConfig {
    pub included_modules: Vec<ModuleId>,
    pub included_sources: Vec<String>,
}

impl CoverageConfig {
    /// Reads `<data_dir>/config.json`. `Ok(None)` when there is none, which
    /// puts every unit in scope.
    pub fn load(data_dir: &Path) -> Result<Option<Self>, CoverageError> {
        let path = data_dir.join(CONFIG_FILE);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(CoverageError::data(&path, err)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|err| CoverageError::Config {
                path,
                reason: err.to_string(),
            })
    }

    pub fn save(&self, data_dir: &Path) -> Result<PathBuf, CoverageError> {
        fs::create_dir_all(data_dir).map_err(|err| CoverageError::data(data_dir, err))?;
        let path = data_dir.join(CONFIG_FILE);
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|err| CoverageError::data(&path, err.into()))?;
        fs::write(&path, bytes).map_err(|err| CoverageError::data(&path, err))?;
        Ok(path)
    }

    pub fn includes(&self, unit: &str, kind: UnitKind) -> bool {
        match kind {
            UnitKind::Module => match ModuleId::parse_absolute(unit) {
                Ok(id) => self.included_modules.iter().any(|prefix| id.is_within(prefix)),
                Err(_) => false,
            },
            UnitKind::Script => self
                .included_sources
                .iter()
                .any(|fragment| unit.contains(fragment.as_str())),
        }
    }
}

/// Scope check for an optional descriptor.
pub(crate) fn in_scope(config: Option<&CoverageConfig>, unit: &str, kind: UnitKind) -> bool {
    config.is_none_or(|config| config.includes(unit, kind))
}
