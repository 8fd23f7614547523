use std::{
    fs,
    path::{Path, PathBuf},
    process,
    sync::atomic::{AtomicU64, Ordering},
};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{CoverageError, SpanId, UnitKind};

/// Version of the persisted hit file layout.
pub const HITS_VERSION: u32 = 1;

const HITS_PREFIX: &str = "hits-";
const HITS_SUFFIX: &str = ".json";

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Hit counts of one span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanHits {
    pub line: u32,
    pub column: u32,
    pub hits: u64,
}

impl SpanHits {
    pub fn span(&self) -> SpanId {
        SpanId::new(self.line, self.column)
    }
}

/// Hits of one coverage unit (module path or script name).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitHits {
    pub unit: String,
    pub kind: UnitKind,
    /// Where the unit's source was read from.
    pub source: String,
    pub spans: Vec<SpanHits>,
}

/// One recording session's persisted data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitFile {
    pub version: u32,
    pub run_id: String,
    /// SHA-256 of the serialized `units`, lowercase hex.
    pub digest: String,
    pub units: Vec<UnitHits>,
}

impl HitFile {
    pub fn new(run_id: &str, units: Vec<UnitHits>) -> Self {
        Self {
            version: HITS_VERSION,
            run_id: run_id.to_string(),
            digest: digest_units(&units),
            units,
        }
    }

    /// Parses and checks a persisted file. The error says why the file
    /// cannot be trusted.
    pub fn parse(bytes: &[u8]) -> Result<Self, String> {
        let file: HitFile = serde_json::from_slice(bytes).map_err(|err| err.to_string())?;
        if file.version != HITS_VERSION {
            return Err(format!("unsupported version {}", file.version));
        }
        if digest_units(&file.units) != file.digest {
            return Err("digest does not match its contents".to_string());
        }
        Ok(file)
    }

    /// Writes to `<dir>/hits-<run_id>.json` through a temporary file and a
    /// rename, so readers never see a partial file. Every call gets its own
    /// temporary file.
    pub fn write_atomic(&self, dir: &Path) -> Result<PathBuf, CoverageError> {
        fs::create_dir_all(dir).map_err(|err| CoverageError::data(dir, err))?;
        let name = file_name(&self.run_id);
        let path = dir.join(&name);
        let temp = dir.join(format!(
            ".{name}.{}.{}.tmp",
            process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|err| CoverageError::data(&path, err.into()))?;
        fs::write(&temp, bytes).map_err(|err| CoverageError::data(&temp, err))?;
        if let Err(err) = fs::rename(&temp, &path) {
            let _ = fs::remove_file(&temp);
            return Err(CoverageError::data(&path, err));
        }
        Ok(path)
    }
}

pub fn file_name(run_id: &str) -> String {
    format!("{HITS_PREFIX}{run_id}{HITS_SUFFIX}")
}

pub fn is_hit_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(HITS_PREFIX) && name.ends_with(HITS_SUFFIX))
}

fn digest_units(units: &[UnitHits]) -> String {
    // Serializing plain structs of strings and integers cannot fail.
    let bytes = serde_json::to_vec(units).unwrap_or_default();
    to_hex(&hash_bytes(&bytes))
}

pub fn hash_bytes(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let result = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    out
}

pub fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}
