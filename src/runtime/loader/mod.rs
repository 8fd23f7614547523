//! Module loader and identity map.
//!
//! Each logical path gets one [`ModuleCell`](state::ModuleCell). The first
//! request claims it and runs resolve, compile and execute; concurrent
//! requests park on the cell until the owner publishes. Outcomes, failures
//! included, are kept for the lifetime of the loader.
//!
//! Cycles are caught two ways: a per-thread stack of in-progress loads
//! catches a body that (transitively) requires itself, and a wait-for graph
//! catches two threads each waiting on a module the other one owns.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
        mpsc::{self, RecvTimeoutError},
    },
    thread::{self, ThreadId},
    time::Duration,
};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::{
    coverage::CoverageRecorder,
    runtime::{
        collaborator::{Pipeline, Requirer, Scope, SourceText},
        module::{ModuleInstance, Namespace},
        module_id::ModuleId,
        repository::{ModuleContent, RepositoryChain},
        value::Value,
    },
};

mod error;
mod state;

pub use error::LoadError;
pub use state::{LoadOutcome, ModuleState};

use state::{Claim, LoadFrame, ModuleCell};

static NEXT_LOADER_ID: AtomicUsize = AtomicUsize::new(0);

enum Claimed {
    Owner(Claim),
    Existing(Arc<ModuleCell>),
}

pub struct ModuleLoader {
    id: usize,
    chain: RepositoryChain,
    pipeline: Arc<dyn Pipeline>,
    recorder: Arc<dyn CoverageRecorder>,
    cells: Mutex<HashMap<ModuleId, Arc<ModuleCell>>>,
    /// Thread -> module it is blocked on. Lock before `cells` when both are
    /// needed.
    waits: Mutex<HashMap<ThreadId, ModuleId>>,
}

impl ModuleLoader {
    pub(crate) fn new(
        chain: RepositoryChain,
        pipeline: Arc<dyn Pipeline>,
        recorder: Arc<dyn CoverageRecorder>,
    ) -> Self {
        Self {
            id: NEXT_LOADER_ID.fetch_add(1, Ordering::Relaxed),
            chain,
            pipeline,
            recorder,
            cells: Mutex::new(HashMap::new()),
            waits: Mutex::new(HashMap::new()),
        }
    }

    pub fn chain(&self) -> &RepositoryChain {
        &self.chain
    }

    pub fn recorder(&self) -> &Arc<dyn CoverageRecorder> {
        &self.recorder
    }

    /// Returns the instance for `path`, loading it on first request. At most
    /// one load runs per path; everyone else gets the same outcome.
    pub fn load(&self, path: &ModuleId) -> LoadOutcome {
        if let Some(chain) = state::cycle_through(self.id, path) {
            debug!(module = %path, "require closes a cycle");
            return Err(LoadError::Cycle { chain });
        }

        let claim = match self.claim(path) {
            Claimed::Owner(claim) => claim,
            Claimed::Existing(cell) => return self.await_cell(path, &cell),
        };
        debug!(module = %path, "claimed module");

        let outcome = {
            let _frame = LoadFrame::push(self.id, path.clone());
            self.instantiate(path)
        };
        match &outcome {
            Ok(module) => info!(module = %path, source = module.source_name(), "module loaded"),
            Err(err) => debug!(module = %path, error = %err, "module failed"),
        }
        claim.publish(outcome)
    }

    /// Like [`load`](Self::load), but gives up waiting after `timeout`. The
    /// load itself keeps running and its outcome is still cached.
    pub fn load_within(self: &Arc<Self>, path: &ModuleId, timeout: Duration) -> LoadOutcome {
        let (sender, receiver) = mpsc::channel();
        let loader = Arc::clone(self);
        let target = path.clone();
        thread::Builder::new()
            .name(format!("loam-load {path}"))
            .spawn(move || {
                // The receiver may have timed out already.
                let _ = sender.send(loader.load(&target));
            })
            .map_err(|err| {
                LoadError::execution(
                    path.as_str(),
                    format!("could not start a load thread: {err}"),
                )
            })?;

        match receiver.recv_timeout(timeout) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => Err(LoadError::TimedOut {
                path: path.clone(),
                waited: timeout,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(LoadError::execution(
                path.as_str(),
                "the load thread stopped without a result",
            )),
        }
    }

    pub fn state(&self, path: &ModuleId) -> ModuleState {
        let cell = self.cells.lock().get(path).cloned();
        match cell {
            Some(cell) => cell.state(),
            None => ModuleState::Unloaded,
        }
    }

    /// The instance for `path` if it is already loaded. Never triggers a load.
    pub fn lookup(&self, path: &ModuleId) -> Option<Arc<ModuleInstance>> {
        match self.state(path) {
            ModuleState::Loaded(module) => Some(module),
            _ => None,
        }
    }

    /// Paths with a successfully loaded instance, sorted.
    pub fn loaded_modules(&self) -> Vec<ModuleId> {
        let cells: Vec<_> = self
            .cells
            .lock()
            .iter()
            .map(|(id, cell)| (id.clone(), Arc::clone(cell)))
            .collect();
        let mut loaded: Vec<ModuleId> = cells
            .into_iter()
            .filter(|(_, cell)| matches!(cell.outcome(), Some(Ok(_))))
            .map(|(id, _)| id)
            .collect();
        loaded.sort();
        loaded
    }

    /// Publishes a host-built module under `path`.
    pub(crate) fn register(&self, instance: ModuleInstance) -> LoadOutcome {
        let path = instance.id().clone();
        let mut cells = self.cells.lock();
        if cells.contains_key(&path) {
            return Err(LoadError::AlreadyRegistered { path });
        }
        let instance = Arc::new(instance);
        cells.insert(path.clone(), Arc::new(ModuleCell::loaded(Arc::clone(&instance))));
        info!(module = %path, "module registered");
        Ok(instance)
    }

    /// Compiles and runs a script against `namespace`.
    pub(crate) fn run_script(
        &self,
        name: &str,
        text: &str,
        namespace: &mut Namespace,
    ) -> Result<Vec<Value>, LoadError> {
        let source = SourceText {
            name,
            module: None,
            text,
        };
        let mut scope = Scope::new(name, namespace, self, &*self.recorder);
        self.pipeline
            .run(&source, &mut scope)
            .map_err(|err| LoadError::from_unit(name, err))
    }

    fn claim(&self, path: &ModuleId) -> Claimed {
        let mut cells = self.cells.lock();
        if let Some(cell) = cells.get(path) {
            return Claimed::Existing(Arc::clone(cell));
        }
        let cell = Arc::new(ModuleCell::loading());
        cells.insert(path.clone(), Arc::clone(&cell));
        Claimed::Owner(Claim::new(cell, path.clone()))
    }

    fn await_cell(&self, path: &ModuleId, cell: &ModuleCell) -> LoadOutcome {
        if let Some(outcome) = cell.outcome() {
            return outcome;
        }

        let me = thread::current().id();
        {
            let mut waits = self.waits.lock();
            if let Some(chain) = self.wait_cycle(&waits, me, path) {
                debug!(module = %path, "waiting would deadlock");
                return Err(LoadError::Cycle { chain });
            }
            waits.insert(me, path.clone());
        }

        debug!(module = %path, "waiting for module loading on another thread");
        let outcome = cell.wait();
        self.waits.lock().remove(&me);
        outcome
    }

    /// Follows waiter -> owner -> what that owner waits for, starting at
    /// `path`. Reaching `me` means blocking would never return.
    fn wait_cycle(
        &self,
        waits: &HashMap<ThreadId, ModuleId>,
        me: ThreadId,
        path: &ModuleId,
    ) -> Option<Vec<ModuleId>> {
        let cells = self.cells.lock();
        let mut links = Vec::new();
        let mut awaited = path.clone();

        for _ in 0..=waits.len() {
            let cell = cells.get(&awaited)?;
            if !cell.is_loading() {
                return None;
            }
            links.push(awaited.clone());
            if cell.owner() == me {
                let mut chain = state::frames_from(self.id, &awaited);
                if chain.is_empty() {
                    chain.push(awaited);
                }
                chain.extend(links);
                return Some(chain);
            }
            awaited = waits.get(&cell.owner())?.clone();
        }
        None
    }

    fn instantiate(&self, path: &ModuleId) -> LoadOutcome {
        let location = self
            .chain
            .resolve(path)?
            .ok_or_else(|| LoadError::NotFound {
                path: path.clone(),
                searched: self.chain.describe(),
            })?;

        let text = match &location.content {
            ModuleContent::Prebuilt(prebuilt) => {
                let instance = prebuilt.instantiate(path.clone(), location.source_name.clone());
                return Ok(Arc::new(instance));
            }
            ModuleContent::Source(handle) => {
                handle.read(&location.repository, &location.source_name)?
            }
        };

        let mut namespace = Namespace::new();
        let source = SourceText {
            name: &location.source_name,
            module: Some(path),
            text: &text,
        };
        let mut scope = Scope::new(path.as_str(), &mut namespace, self, &*self.recorder);
        self.pipeline
            .run(&source, &mut scope)
            .map_err(|err| LoadError::from_unit(path.as_str(), err))?;

        let instance = namespace
            .into_instance(path.clone(), location.source_name.clone())
            .map_err(|message| LoadError::execution(path.as_str(), message))?;
        Ok(Arc::new(instance))
    }
}

impl Requirer for ModuleLoader {
    fn require(&self, path: &ModuleId) -> LoadOutcome {
        self.load(path)
    }
}
