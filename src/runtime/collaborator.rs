//! Contracts for the compiler and evaluator the loader drives.
//!
//! The loader treats both as opaque. A [`Compiler`] turns source text into a
//! program; an [`Evaluator`] runs that program's top-level forms against a
//! [`Scope`], which is how it reaches the module namespace, other modules and
//! the coverage recorder.

use std::sync::Arc;

use thiserror::Error;

use crate::{
    coverage::{CoverageRecorder, SpanId, UnitKind},
    runtime::{
        loader::LoadError,
        module::{ModuleInstance, Namespace},
        module_id::ModuleId,
        value::Value,
    },
};

/// Source handed to a compiler.
#[derive(Debug, Clone, Copy)]
pub struct SourceText<'a> {
    /// File path, resource name or script name.
    pub name: &'a str,
    /// The module being loaded; `None` for scripts.
    pub module: Option<&'a ModuleId>,
    pub text: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CompileError {
    pub span: Option<SpanId>,
    pub message: String,
}

impl CompileError {
    pub fn new(span: Option<SpanId>, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
    /// Uncaught error raised by the running body.
    #[error("{message}")]
    Raised {
        span: Option<SpanId>,
        message: String,
    },
    /// A required module failed to load. Re-surfaced unchanged.
    #[error(transparent)]
    Dependency(Box<LoadError>),
}

impl ExecutionError {
    pub fn raised(span: Option<SpanId>, message: impl Into<String>) -> Self {
        ExecutionError::Raised {
            span,
            message: message.into(),
        }
    }
}

impl From<LoadError> for ExecutionError {
    fn from(err: LoadError) -> Self {
        ExecutionError::Dependency(Box::new(err))
    }
}

pub trait Compiler: Send + Sync + 'static {
    type Program: Send + Sync;

    fn compile(&self, source: &SourceText<'_>) -> Result<Self::Program, CompileError>;

    /// Spans of `program` that the evaluator reports to the recorder.
    fn spans(&self, program: &Self::Program) -> Vec<SpanId>;
}

pub trait Evaluator<P>: Send + Sync + 'static {
    /// Runs every top-level form in order, returning the non-void results.
    fn execute(&self, program: &P, scope: &mut Scope<'_>)
    -> Result<Vec<Value>, ExecutionError>;
}

/// Loads (or waits for) another module on behalf of a running body.
pub(crate) trait Requirer: Send + Sync {
    fn require(&self, path: &ModuleId) -> Result<Arc<ModuleInstance>, LoadError>;
}

/// What a running body can see and touch.
pub struct Scope<'a> {
    unit: &'a str,
    namespace: &'a mut Namespace,
    requirer: &'a dyn Requirer,
    recorder: &'a dyn CoverageRecorder,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(
        unit: &'a str,
        namespace: &'a mut Namespace,
        requirer: &'a dyn Requirer,
        recorder: &'a dyn CoverageRecorder,
    ) -> Self {
        Self {
            unit,
            namespace,
            requirer,
            recorder,
        }
    }

    /// Coverage unit of the running body.
    pub fn unit(&self) -> &str {
        self.unit
    }

    pub fn namespace(&self) -> &Namespace {
        self.namespace
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.namespace.lookup(name)
    }

    pub fn define(&mut self, name: &str, value: Value) {
        self.namespace.define(name, value);
    }

    pub fn provide(&mut self, name: &str) {
        self.namespace.provide(name);
    }

    pub fn set_docs(&mut self, docs: &str) {
        self.namespace.set_docs(docs);
    }

    /// Loads `path` and imports its exports into this scope.
    pub fn require(&mut self, path: &ModuleId) -> Result<Arc<ModuleInstance>, ExecutionError> {
        let module = self.requirer.require(path)?;
        self.namespace.import(&module);
        Ok(module)
    }

    #[inline]
    pub fn record(&self, span: SpanId) {
        self.recorder.record(self.unit, span);
    }

    fn instrument(&self, source: &SourceText<'_>, spans: &[SpanId]) {
        let kind = match source.module {
            Some(_) => UnitKind::Module,
            None => UnitKind::Script,
        };
        self.recorder.instrument(self.unit, kind, source.name, spans);
    }
}

pub(crate) enum UnitError {
    Compile(CompileError),
    Execution(ExecutionError),
}

/// Compile-then-execute for one source, with the program type erased so the
/// loader does not need to be generic.
pub(crate) trait Pipeline: Send + Sync {
    fn run(&self, source: &SourceText<'_>, scope: &mut Scope<'_>)
    -> Result<Vec<Value>, UnitError>;
}

pub(crate) struct Collaborators<C, E> {
    compiler: C,
    evaluator: E,
}

impl<C, E> Collaborators<C, E> {
    pub(crate) fn new(compiler: C, evaluator: E) -> Self {
        Self {
            compiler,
            evaluator,
        }
    }
}

impl<C, E> Pipeline for Collaborators<C, E>
where
    C: Compiler,
    E: Evaluator<C::Program>,
{
    fn run(
        &self,
        source: &SourceText<'_>,
        scope: &mut Scope<'_>,
    ) -> Result<Vec<Value>, UnitError> {
        let program = self.compiler.compile(source).map_err(UnitError::Compile)?;
        if scope.recorder.is_enabled() {
            scope.instrument(source, &self.compiler.spans(&program));
        }
        self.evaluator
            .execute(&program, scope)
            .map_err(UnitError::Execution)
    }
}
