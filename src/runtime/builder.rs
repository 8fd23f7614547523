use std::{env, path::PathBuf, sync::Arc};

use thiserror::Error;
use tracing::debug;

use super::{
    Runtime,
    collaborator::{Collaborators, Compiler, Evaluator, Pipeline},
    forms::{FormCompiler, FormEvaluator},
    loader::ModuleLoader,
    repository::{
        BootstrapRepository, FileSystemRepository, ModuleRepository, RepositoryChain,
        RepositoryError, ResourceRepository,
    },
};
use crate::{
    coverage::{CoverageError, CoverageRecorder, CoverageSession, NoopRecorder},
    diagnostics::{ErrorCode, INVALID_CONFIGURATION, render_error},
};

/// Platform path list of repository directories.
pub const REPOSITORY_PATH_ENV: &str = "LOAM_REPOSITORY_PATH";
/// Coverage data directory; enables recording when set.
pub const COVERAGE_DATA_DIR_ENV: &str = "LOAM_COVERAGE_DATA_DIR";

/// Where the built-in library sits in the chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BootstrapPrecedence {
    /// Consulted after every user repository, so users can shadow it.
    #[default]
    Lowest,
    /// Consulted first; user repositories cannot replace core modules.
    Highest,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{}", INVALID_CONFIGURATION.format(&[format!("repository directory `{}` does not exist", path.display()).as_str()]))]
    MissingDirectory { path: PathBuf },

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Coverage(#[from] CoverageError),
}

impl ConfigError {
    pub fn code(&self) -> &'static ErrorCode {
        match self {
            ConfigError::MissingDirectory { .. } => &INVALID_CONFIGURATION,
            ConfigError::Repository(err) => err.code(),
            ConfigError::Coverage(err) => err.code(),
        }
    }

    pub fn render(&self) -> String {
        render_error(self.code(), &self.to_string())
    }
}

enum PendingRepository {
    Directory(PathBuf),
    Archive(PathBuf),
    Ready(Arc<dyn ModuleRepository>),
}

impl PendingRepository {
    fn open(self) -> Result<Arc<dyn ModuleRepository>, ConfigError> {
        match self {
            PendingRepository::Directory(path) => {
                if !path.is_dir() {
                    return Err(ConfigError::MissingDirectory { path });
                }
                Ok(Arc::new(FileSystemRepository::new(path)))
            }
            PendingRepository::Archive(path) => {
                Ok(Arc::new(ResourceRepository::open_archive(&path)?))
            }
            PendingRepository::Ready(repository) => Ok(repository),
        }
    }
}

/// Configures and builds a [`Runtime`]. The repository chain is fixed once
/// [`build`](Self::build) returns.
///
/// ```no_run
/// use loam::runtime::RuntimeBuilder;
///
/// let runtime = RuntimeBuilder::forms()
///     .add_repository_directory("vendor")
///     .add_repository_directory("app")
///     .build()?;
/// let module = runtime.load_path("/app/main")?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct RuntimeBuilder {
    pipeline: Arc<dyn Pipeline>,
    repositories: Vec<PendingRepository>,
    bootstrap: BootstrapPrecedence,
    coverage_data_dir: Option<PathBuf>,
    recorder: Option<Arc<dyn CoverageRecorder>>,
}

impl RuntimeBuilder {
    pub fn new<C, E>(compiler: C, evaluator: E) -> Self
    where
        C: Compiler,
        E: Evaluator<C::Program>,
    {
        Self {
            pipeline: Arc::new(Collaborators::new(compiler, evaluator)),
            repositories: Vec::new(),
            bootstrap: BootstrapPrecedence::default(),
            coverage_data_dir: None,
            recorder: None,
        }
    }

    /// A builder for the built-in form language.
    pub fn forms() -> Self {
        Self::new(FormCompiler, FormEvaluator)
    }

    /// Repositories are consulted in the order they are added.
    pub fn add_repository_directory(mut self, root: impl Into<PathBuf>) -> Self {
        self.repositories
            .push(PendingRepository::Directory(root.into()));
        self
    }

    pub fn add_archive(mut self, path: impl Into<PathBuf>) -> Self {
        self.repositories.push(PendingRepository::Archive(path.into()));
        self
    }

    pub fn add_repository(mut self, repository: Arc<dyn ModuleRepository>) -> Self {
        self.repositories.push(PendingRepository::Ready(repository));
        self
    }

    pub fn bootstrap_precedence(mut self, precedence: BootstrapPrecedence) -> Self {
        self.bootstrap = precedence;
        self
    }

    /// Records coverage into `dir` through a [`CoverageSession`].
    pub fn coverage_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.coverage_data_dir = Some(dir.into());
        self
    }

    /// Uses a host-provided recorder. Takes precedence over
    /// [`coverage_data_dir`](Self::coverage_data_dir).
    pub fn recorder(mut self, recorder: Arc<dyn CoverageRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Appends the directories in `LOAM_REPOSITORY_PATH` after the explicit
    /// ones and picks up `LOAM_COVERAGE_DATA_DIR` unless a data directory
    /// was already set.
    pub fn with_env(mut self) -> Self {
        if let Some(paths) = env::var_os(REPOSITORY_PATH_ENV) {
            for path in env::split_paths(&paths) {
                if path.as_os_str().is_empty() {
                    continue;
                }
                debug!(path = %path.display(), "repository from environment");
                self = self.add_repository_directory(path);
            }
        }
        if self.coverage_data_dir.is_none() {
            if let Some(dir) = env::var_os(COVERAGE_DATA_DIR_ENV) {
                self.coverage_data_dir = Some(PathBuf::from(dir));
            }
        }
        self
    }

    pub fn build(self) -> Result<Runtime, ConfigError> {
        let mut repositories = self
            .repositories
            .into_iter()
            .map(PendingRepository::open)
            .collect::<Result<Vec<_>, _>>()?;
        let bootstrap: Arc<dyn ModuleRepository> = Arc::new(BootstrapRepository::new()?);
        match self.bootstrap {
            BootstrapPrecedence::Lowest => repositories.push(bootstrap),
            BootstrapPrecedence::Highest => repositories.insert(0, bootstrap),
        }
        let chain = RepositoryChain::new(repositories);
        debug!(chain = %chain.describe(), "repository chain configured");

        let (recorder, coverage) = match (self.recorder, self.coverage_data_dir) {
            (Some(recorder), _) => (recorder, None),
            (None, Some(dir)) => {
                let session = Arc::new(CoverageSession::open(&dir)?);
                let recorder: Arc<dyn CoverageRecorder> = session.clone();
                (recorder, Some(session))
            }
            (None, None) => {
                let recorder: Arc<dyn CoverageRecorder> = Arc::new(NoopRecorder);
                (recorder, None)
            }
        };

        let loader = ModuleLoader::new(chain, self.pipeline, recorder);
        Ok(Runtime::from_parts(Arc::new(loader), coverage))
    }
}
