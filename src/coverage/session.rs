use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    process,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use super::{
    CoverageConfig, CoverageError, CoverageRecorder, SpanId, UnitKind,
    config::in_scope,
    data::{HitFile, SpanHits, UnitHits, hash_bytes, to_hex},
};

static NEXT_SESSION: AtomicU64 = AtomicU64::new(0);

/// Counters of one unit. Each unit is its own shard, so threads running
/// different modules never touch the same lock.
struct UnitCounters {
    kind: UnitKind,
    source: RwLock<String>,
    spans: RwLock<HashMap<SpanId, AtomicU64>>,
}

impl UnitCounters {
    fn new(kind: UnitKind, source: &str) -> Self {
        Self {
            kind,
            source: RwLock::new(source.to_string()),
            spans: RwLock::new(HashMap::new()),
        }
    }

    fn add_spans(&self, spans: &[SpanId]) {
        let mut counters = self.spans.write();
        for span in spans {
            counters.entry(*span).or_insert_with(|| AtomicU64::new(0));
        }
    }

    fn hit(&self, span: SpanId) {
        if let Some(counter) = self.spans.read().get(&span) {
            counter.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.spans
            .write()
            .entry(span)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self, unit: &str) -> UnitHits {
        let mut spans: Vec<SpanHits> = self
            .spans
            .read()
            .iter()
            .map(|(span, counter)| SpanHits {
                line: span.line,
                column: span.column,
                hits: counter.load(Ordering::Relaxed),
            })
            .collect();
        spans.sort_by_key(SpanHits::span);
        UnitHits {
            unit: unit.to_string(),
            kind: self.kind,
            source: self.source.read().clone(),
            spans,
        }
    }
}

/// In-process coverage recorder backed by a data directory.
///
/// Each session owns one `hits-<run id>.json` file there. Every flush
/// rewrites that file with the session's cumulative counts, so flushing
/// repeatedly never counts a hit twice. Dirty sessions flush on drop.
pub struct CoverageSession {
    data_dir: PathBuf,
    run_id: String,
    config: Option<CoverageConfig>,
    units: RwLock<HashMap<String, Arc<UnitCounters>>>,
    dirty: AtomicBool,
    /// Held across snapshot and write so the newest snapshot lands last.
    flushing: Mutex<()>,
}

impl CoverageSession {
    pub fn open(data_dir: &Path) -> Result<Self, CoverageError> {
        std::fs::create_dir_all(data_dir).map_err(|err| CoverageError::data(data_dir, err))?;
        let config = CoverageConfig::load(data_dir)?;
        let session = Self {
            data_dir: data_dir.to_path_buf(),
            run_id: new_run_id(),
            config,
            units: RwLock::new(HashMap::new()),
            dirty: AtomicBool::new(false),
            flushing: Mutex::new(()),
        };
        info!(
            data_dir = %session.data_dir.display(),
            run_id = %session.run_id,
            "coverage session opened"
        );
        Ok(session)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Hits recorded so far for a span; `None` if it is not tracked.
    pub fn hits(&self, unit: &str, span: SpanId) -> Option<u64> {
        let counters = self.units.read().get(unit).cloned()?;
        let spans = counters.spans.read();
        spans.get(&span).map(|counter| counter.load(Ordering::Relaxed))
    }

    /// Current counts of every tracked unit, sorted by unit.
    pub fn snapshot(&self) -> Vec<UnitHits> {
        let units: Vec<(String, Arc<UnitCounters>)> = self
            .units
            .read()
            .iter()
            .map(|(unit, counters)| (unit.clone(), Arc::clone(counters)))
            .collect();
        let mut snapshot: Vec<UnitHits> = units
            .iter()
            .map(|(unit, counters)| counters.snapshot(unit))
            .collect();
        snapshot.sort_by(|a, b| a.unit.cmp(&b.unit));
        snapshot
    }

    /// Persists the session's counts. Returns the written file, or `None` if
    /// nothing was tracked. A failed flush leaves the session dirty.
    pub fn flush(&self) -> Result<Option<PathBuf>, CoverageError> {
        let _flushing = self.flushing.lock();
        self.dirty.store(false, Ordering::Release);
        let units = self.snapshot();
        if units.is_empty() {
            return Ok(None);
        }
        match HitFile::new(&self.run_id, units).write_atomic(&self.data_dir) {
            Ok(path) => {
                info!(path = %path.display(), "coverage data flushed");
                Ok(Some(path))
            }
            Err(err) => {
                self.mark_dirty();
                Err(err)
            }
        }
    }

    fn counters(&self, unit: &str, kind: UnitKind, source: &str) -> Option<Arc<UnitCounters>> {
        if let Some(counters) = self.units.read().get(unit) {
            return Some(Arc::clone(counters));
        }
        if !in_scope(self.config.as_ref(), unit, kind) {
            return None;
        }
        let mut units = self.units.write();
        let counters = units
            .entry(unit.to_string())
            .or_insert_with(|| Arc::new(UnitCounters::new(kind, source)));
        Some(Arc::clone(counters))
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }
}

impl CoverageRecorder for CoverageSession {
    fn instrument(&self, unit: &str, kind: UnitKind, source: &str, spans: &[SpanId]) {
        let Some(counters) = self.counters(unit, kind, source) else {
            return;
        };
        if counters.source.read().is_empty() {
            *counters.source.write() = source.to_string();
        }
        counters.add_spans(spans);
        self.mark_dirty();
    }

    fn record(&self, unit: &str, span: SpanId) {
        // Units nobody instrumented are taken to be modules with an unknown
        // source.
        let Some(counters) = self.counters(unit, UnitKind::Module, "") else {
            return;
        };
        counters.hit(span);
        self.mark_dirty();
    }
}

impl Drop for CoverageSession {
    fn drop(&mut self) {
        if !self.dirty.load(Ordering::Acquire) {
            return;
        }
        if let Err(err) = self.flush() {
            warn!(error = %err, "could not flush coverage data");
        }
    }
}

fn new_run_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let seed = format!(
        "{}:{}:{}",
        process::id(),
        nanos,
        NEXT_SESSION.fetch_add(1, Ordering::Relaxed)
    );
    to_hex(&hash_bytes(seed.as_bytes()))[..16].to_string()
}
