use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use super::{
    CoverageConfig, CoverageError, SkippedFile, SpanId, UnitKind,
    config::in_scope,
    data::{HitFile, SpanHits, is_hit_file},
    summary,
};

/// Merged coverage of one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitReport {
    pub unit: String,
    pub kind: UnitKind,
    pub source: String,
    /// Sorted by position.
    pub spans: Vec<SpanHits>,
}

impl UnitReport {
    pub fn instrumented(&self) -> usize {
        self.spans.len()
    }

    pub fn hit(&self) -> usize {
        self.spans.iter().filter(|span| span.hits > 0).count()
    }

    pub fn missed(&self) -> impl Iterator<Item = &SpanHits> {
        self.spans.iter().filter(|span| span.hits == 0)
    }

    pub fn percent(&self) -> f64 {
        percent(self.hit(), self.instrumented())
    }

    pub fn hits(&self, span: SpanId) -> Option<u64> {
        self.spans
            .binary_search_by_key(&span, SpanHits::span)
            .ok()
            .map(|index| self.spans[index].hits)
    }
}

/// Result of [`merge`]: units sorted by name, plus the files that were left
/// out.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoverageReport {
    pub units: Vec<UnitReport>,
    pub files_merged: usize,
    pub skipped: Vec<SkippedFile>,
}

impl CoverageReport {
    pub fn instrumented(&self) -> usize {
        self.units.iter().map(UnitReport::instrumented).sum()
    }

    pub fn hit(&self) -> usize {
        self.units.iter().map(UnitReport::hit).sum()
    }

    pub fn percent(&self) -> f64 {
        percent(self.hit(), self.instrumented())
    }

    pub fn unit(&self, unit: &str) -> Option<&UnitReport> {
        self.units
            .binary_search_by(|report| report.unit.as_str().cmp(unit))
            .ok()
            .map(|index| &self.units[index])
    }

    pub fn hits(&self, unit: &str, span: SpanId) -> Option<u64> {
        self.unit(unit)?.hits(span)
    }

    /// Terminal summary, one line per unit.
    pub fn summary_text(&self, colors: bool) -> String {
        summary::summary_text(self, colors)
    }
}

/// An empty unit has nothing to miss.
fn percent(hit: usize, instrumented: usize) -> f64 {
    if instrumented == 0 {
        return 100.0;
    }
    hit as f64 * 100.0 / instrumented as f64
}

#[derive(Default)]
struct Accumulator {
    kind: Option<UnitKind>,
    source: String,
    spans: BTreeMap<SpanId, u64>,
}

/// Sums every hit file in `data_dir` into one report.
///
/// Files that cannot be read, parsed or verified are skipped with a warning
/// and listed in [`CoverageReport::skipped`]. Counts for the same unit and
/// span are added, so merging never loses a hit. Only an invalid
/// `config.json` or an unreadable directory fails the merge.
pub fn merge(data_dir: &Path) -> Result<CoverageReport, CoverageError> {
    if !data_dir.exists() {
        return Ok(CoverageReport::default());
    }
    let config = CoverageConfig::load(data_dir)?;
    let files = hit_files(data_dir)?;

    let parsed: Vec<(PathBuf, Result<HitFile, String>)> = files
        .into_par_iter()
        .map(|path| {
            let file = fs::read(&path)
                .map_err(|err| err.to_string())
                .and_then(|bytes| HitFile::parse(&bytes));
            (path, file)
        })
        .collect();

    let mut units: BTreeMap<String, Accumulator> = BTreeMap::new();
    let mut report = CoverageReport::default();
    for (path, file) in parsed {
        let file = match file {
            Ok(file) => file,
            Err(reason) => {
                let skipped = SkippedFile { path, reason };
                warn!("{}", skipped.message());
                report.skipped.push(skipped);
                continue;
            }
        };
        report.files_merged += 1;
        for hits in file.units {
            if !in_scope(config.as_ref(), &hits.unit, hits.kind) {
                continue;
            }
            let unit = units.entry(hits.unit).or_default();
            unit.kind.get_or_insert(hits.kind);
            if unit.source.is_empty() {
                unit.source = hits.source;
            }
            for span in hits.spans {
                let count = unit.spans.entry(span.span()).or_insert(0);
                *count = count.saturating_add(span.hits);
            }
        }
    }

    report.units = units
        .into_iter()
        .map(|(unit, acc)| UnitReport {
            unit,
            kind: acc.kind.unwrap_or(UnitKind::Module),
            source: acc.source,
            spans: acc
                .spans
                .into_iter()
                .map(|(span, hits)| SpanHits {
                    line: span.line,
                    column: span.column,
                    hits,
                })
                .collect(),
        })
        .collect();
    info!(
        data_dir = %data_dir.display(),
        files = report.files_merged,
        skipped = report.skipped.len(),
        units = report.units.len(),
        "coverage data merged"
    );
    Ok(report)
}

/// `hits-*.json` files directly under `dir`, sorted by name.
fn hit_files(dir: &Path) -> Result<Vec<PathBuf>, CoverageError> {
    let entries = fs::read_dir(dir).map_err(|err| CoverageError::data(dir, err))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| CoverageError::data(dir, err))?;
        let path = entry.path();
        if path.is_file() && is_hit_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
