use std::{
    cell::RefCell,
    sync::Arc,
    thread::{self, ThreadId},
};

use parking_lot::{Condvar, Mutex};

use super::LoadError;
use crate::runtime::{module::ModuleInstance, module_id::ModuleId};

pub type LoadOutcome = Result<Arc<ModuleInstance>, LoadError>;

/// Observable load state of one logical path.
#[derive(Debug, Clone)]
pub enum ModuleState {
    Unloaded,
    Loading,
    Loaded(Arc<ModuleInstance>),
    /// Terminal; the same error is returned to every later request.
    Failed(LoadError),
}

enum CellState {
    Loading,
    Done(LoadOutcome),
}

/// Identity-map entry: either in progress, with waiters parked on `ready`,
/// or resolved.
pub(super) struct ModuleCell {
    owner: ThreadId,
    state: Mutex<CellState>,
    ready: Condvar,
}

impl ModuleCell {
    pub(super) fn loading() -> Self {
        Self {
            owner: thread::current().id(),
            state: Mutex::new(CellState::Loading),
            ready: Condvar::new(),
        }
    }

    pub(super) fn loaded(instance: Arc<ModuleInstance>) -> Self {
        Self {
            owner: thread::current().id(),
            state: Mutex::new(CellState::Done(Ok(instance))),
            ready: Condvar::new(),
        }
    }

    /// Thread that claimed the cell.
    pub(super) fn owner(&self) -> ThreadId {
        self.owner
    }

    pub(super) fn is_loading(&self) -> bool {
        matches!(*self.state.lock(), CellState::Loading)
    }

    pub(super) fn outcome(&self) -> Option<LoadOutcome> {
        match &*self.state.lock() {
            CellState::Loading => None,
            CellState::Done(outcome) => Some(outcome.clone()),
        }
    }

    pub(super) fn state(&self) -> ModuleState {
        match &*self.state.lock() {
            CellState::Loading => ModuleState::Loading,
            CellState::Done(Ok(instance)) => ModuleState::Loaded(Arc::clone(instance)),
            CellState::Done(Err(err)) => ModuleState::Failed(err.clone()),
        }
    }

    /// Blocks until the owning load publishes.
    pub(super) fn wait(&self) -> LoadOutcome {
        let mut state = self.state.lock();
        loop {
            match &*state {
                CellState::Done(outcome) => return outcome.clone(),
                CellState::Loading => self.ready.wait(&mut state),
            }
        }
    }

    fn publish(&self, outcome: LoadOutcome) {
        *self.state.lock() = CellState::Done(outcome);
        self.ready.notify_all();
    }
}

/// Ownership of an in-progress cell. Dropping it unpublished (a panicking
/// body) fails the module so waiters are released.
pub(super) struct Claim {
    cell: Arc<ModuleCell>,
    path: ModuleId,
    published: bool,
}

impl Claim {
    pub(super) fn new(cell: Arc<ModuleCell>, path: ModuleId) -> Self {
        Self {
            cell,
            path,
            published: false,
        }
    }

    pub(super) fn publish(mut self, outcome: LoadOutcome) -> LoadOutcome {
        self.cell.publish(outcome.clone());
        self.published = true;
        outcome
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        if !self.published {
            self.cell.publish(Err(LoadError::execution(
                self.path.as_str(),
                "the load was abandoned before it finished",
            )));
        }
    }
}

thread_local! {
    /// Loads in progress on this thread, outermost first, tagged with the
    /// loader that runs them.
    static LOAD_STACK: RefCell<Vec<(usize, ModuleId)>> = const { RefCell::new(Vec::new()) };
}

/// Frame on this thread's load stack, popped on drop.
pub(super) struct LoadFrame {
    _private: (),
}

impl LoadFrame {
    pub(super) fn push(loader: usize, path: ModuleId) -> Self {
        LOAD_STACK.with(|stack| stack.borrow_mut().push((loader, path)));
        Self { _private: () }
    }
}

impl Drop for LoadFrame {
    fn drop(&mut self) {
        LOAD_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// This thread's in-progress loads for `loader`, starting at `path`. Empty
/// when `path` is not being loaded here.
pub(super) fn frames_from(loader: usize, path: &ModuleId) -> Vec<ModuleId> {
    LOAD_STACK.with(|stack| {
        let stack = stack.borrow();
        let mine = stack.iter().filter(|(owner, _)| *owner == loader);
        mine.skip_while(|(_, id)| id != path)
            .map(|(_, id)| id.clone())
            .collect()
    })
}

/// If `path` is already loading on this thread, the cycle it would close:
/// `path -> ... -> path`.
pub(super) fn cycle_through(loader: usize, path: &ModuleId) -> Option<Vec<ModuleId>> {
    let mut chain = frames_from(loader, path);
    if chain.is_empty() {
        return None;
    }
    chain.push(path.clone());
    Some(chain)
}
