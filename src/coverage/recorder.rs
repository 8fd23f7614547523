use std::fmt;

use serde::{Deserialize, Serialize};

/// A trackable source location: the 1-based line and column where a form
/// starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpanId {
    pub line: u32,
    pub column: u32,
}

impl SpanId {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// What a coverage unit is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    /// Keyed by logical module path.
    Module,
    /// Keyed by source name.
    Script,
}

/// Hook the evaluator calls for every executed span.
///
/// A unit is a module path or, for scripts, the script's source name.
/// Implementations must tolerate concurrent calls from many threads.
pub trait CoverageRecorder: Send + Sync {
    /// Registers the spans of `unit` that can be hit, with zero hits.
    fn instrument(&self, unit: &str, kind: UnitKind, source: &str, spans: &[SpanId]);

    fn record(&self, unit: &str, span: SpanId);

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Recorder used when coverage is off.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecorder;

impl CoverageRecorder for NoopRecorder {
    #[inline]
    fn instrument(&self, _unit: &str, _kind: UnitKind, _source: &str, _spans: &[SpanId]) {}

    #[inline]
    fn record(&self, _unit: &str, _span: SpanId) {}

    fn is_enabled(&self) -> bool {
        false
    }
}
