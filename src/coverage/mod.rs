//! Coverage recording, aggregation and reporting.
//!
//! A [`CoverageSession`] is the recorder a runtime hands to its evaluator.
//! It keeps in-memory hit counters per unit and persists them as one
//! `hits-<run id>.json` file in a data directory. [`merge`] sums every file
//! in a data directory into a [`CoverageReport`], which can be printed as a
//! summary or rendered to HTML and JSON with [`render`].

use std::{
    io,
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::diagnostics::{
    COVERAGE_CONFIG_INVALID, COVERAGE_DATA_FAILED, COVERAGE_FILE_SKIPPED, COVERAGE_OUTPUT_FAILED,
    ErrorCode, render_error,
};

mod aggregate;
mod config;
mod data;
mod recorder;
mod render;
mod session;
mod summary;

pub use aggregate::{CoverageReport, UnitReport, merge};
pub use config::{CONFIG_FILE, CoverageConfig};
pub use data::{HITS_VERSION, HitFile, SpanHits, UnitHits, is_hit_file};
pub use recorder::{CoverageRecorder, NoopRecorder, SpanId, UnitKind};
pub use render::{HTML_FILE, JSON_FILE, render};
pub use session::CoverageSession;
pub use summary::colors_enabled;

#[derive(Debug, Error)]
pub enum CoverageError {
    #[error("{}", COVERAGE_DATA_FAILED.format(&[path.display().to_string().as_str(), cause.to_string().as_str()]))]
    Data {
        path: PathBuf,
        #[source]
        cause: io::Error,
    },

    #[error("{}", COVERAGE_OUTPUT_FAILED.format(&[path.display().to_string().as_str(), cause.to_string().as_str()]))]
    Output {
        path: PathBuf,
        #[source]
        cause: io::Error,
    },

    #[error("{}", COVERAGE_CONFIG_INVALID.format(&[path.display().to_string().as_str(), reason.as_str()]))]
    Config { path: PathBuf, reason: String },
}

impl CoverageError {
    pub(crate) fn data(path: &Path, cause: io::Error) -> Self {
        CoverageError::Data {
            path: path.to_path_buf(),
            cause,
        }
    }

    pub(crate) fn output(path: &Path, cause: io::Error) -> Self {
        CoverageError::Output {
            path: path.to_path_buf(),
            cause,
        }
    }

    pub fn code(&self) -> &'static ErrorCode {
        match self {
            CoverageError::Data { .. } => &COVERAGE_DATA_FAILED,
            CoverageError::Output { .. } => &COVERAGE_OUTPUT_FAILED,
            CoverageError::Config { .. } => &COVERAGE_CONFIG_INVALID,
        }
    }

    pub fn render(&self) -> String {
        render_error(self.code(), &self.to_string())
    }
}

/// A data file that was left out of a merge.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

impl SkippedFile {
    pub fn message(&self) -> String {
        let path = self.path.display().to_string();
        COVERAGE_FILE_SKIPPED.format(&[path.as_str(), self.reason.as_str()])
    }
}
