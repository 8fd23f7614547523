use std::time::Duration;

use thiserror::Error;

use crate::{
    coverage::SpanId,
    diagnostics::{
        COMPILE_FAILED, EXECUTION_FAILED, ErrorCode, LOAD_TIMED_OUT, MODULE_ALREADY_REGISTERED,
        MODULE_CYCLE, MODULE_NOT_FOUND, render_error,
    },
    runtime::{
        collaborator::{ExecutionError, UnitError},
        module_id::{ModuleId, ModuleIdError},
        repository::RepositoryError,
    },
};

/// Why a module (or script) failed to load.
///
/// Cheap to clone: a failed load is cached and the same error is handed to
/// every requester.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    #[error("{}", MODULE_NOT_FOUND.format(&[path.as_str(), searched.as_str()]))]
    NotFound { path: ModuleId, searched: String },

    #[error(transparent)]
    InvalidPath(#[from] ModuleIdError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("{}", COMPILE_FAILED.format(&[unit.as_str(), position(span).as_str(), message.as_str()]))]
    Compile {
        unit: String,
        span: Option<SpanId>,
        message: String,
    },

    #[error("{}", EXECUTION_FAILED.format(&[unit.as_str(), position(span).as_str(), message.as_str()]))]
    Execution {
        unit: String,
        span: Option<SpanId>,
        message: String,
    },

    /// `chain` starts and ends with the module that closes the cycle.
    #[error("{}", MODULE_CYCLE.format(&[cycle_chain(chain).as_str()]))]
    Cycle { chain: Vec<ModuleId> },

    #[error("{}", LOAD_TIMED_OUT.format(&[path.as_str(), waited.as_millis().to_string().as_str()]))]
    TimedOut { path: ModuleId, waited: Duration },

    #[error("{}", MODULE_ALREADY_REGISTERED.format(&[path.as_str()]))]
    AlreadyRegistered { path: ModuleId },

    /// `unit` required a module that failed with `cause`. Reported under the
    /// cause's code.
    #[error("`{unit}` could not load a required module: {cause}")]
    Dependency { unit: String, cause: Box<LoadError> },
}

fn position(span: &Option<SpanId>) -> String {
    match span {
        Some(span) => span.to_string(),
        None => "an unknown position".to_string(),
    }
}

fn cycle_chain(chain: &[ModuleId]) -> String {
    chain
        .iter()
        .map(ModuleId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl LoadError {
    pub fn code(&self) -> &'static ErrorCode {
        match self {
            LoadError::NotFound { .. } => &MODULE_NOT_FOUND,
            LoadError::InvalidPath(err) => err.code(),
            LoadError::Repository(err) => err.code(),
            LoadError::Compile { .. } => &COMPILE_FAILED,
            LoadError::Execution { .. } => &EXECUTION_FAILED,
            LoadError::Cycle { .. } => &MODULE_CYCLE,
            LoadError::TimedOut { .. } => &LOAD_TIMED_OUT,
            LoadError::AlreadyRegistered { .. } => &MODULE_ALREADY_REGISTERED,
            LoadError::Dependency { cause, .. } => cause.code(),
        }
    }

    /// Terminal rendering with code, title and hint.
    pub fn render(&self) -> String {
        render_error(self.code(), &self.to_string())
    }

    pub fn is_cycle(&self) -> bool {
        matches!(self.root_cause(), LoadError::Cycle { .. })
    }

    /// The failure at the bottom of a chain of dependency failures.
    pub fn root_cause(&self) -> &LoadError {
        let mut err = self;
        while let LoadError::Dependency { cause, .. } = err {
            err = &**cause;
        }
        err
    }

    pub(crate) fn execution(unit: &str, message: impl Into<String>) -> Self {
        LoadError::Execution {
            unit: unit.to_string(),
            span: None,
            message: message.into(),
        }
    }

    /// Attributes a compile or execution failure to `unit`. Failures of
    /// required modules are wrapped so `unit` is named; cycles pass through
    /// since their chain already names every module involved.
    pub(crate) fn from_unit(unit: &str, err: UnitError) -> Self {
        match err {
            UnitError::Compile(err) => LoadError::Compile {
                unit: unit.to_string(),
                span: err.span,
                message: err.message,
            },
            UnitError::Execution(ExecutionError::Raised { span, message }) => {
                LoadError::Execution {
                    unit: unit.to_string(),
                    span,
                    message,
                }
            }
            UnitError::Execution(ExecutionError::Dependency(err)) if err.is_cycle() => *err,
            UnitError::Execution(ExecutionError::Dependency(err)) => LoadError::Dependency {
                unit: unit.to_string(),
                cause: err,
            },
        }
    }
}
