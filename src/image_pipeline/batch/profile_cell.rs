//! The single join point between the shared reference profile and every file task.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::image_pipeline::common::error::{DebandError, Result};
use crate::image_pipeline::flat_field::CorrectionProfile;

/// What a dependent task receives: the profile, or the reason it is unavailable.
pub type ProfileOutcome = std::result::Result<Arc<CorrectionProfile>, Arc<str>>;

type Waiter = Box<dyn FnOnce(ProfileOutcome) + Send>;

enum State {
    Pending(Vec<Waiter>),
    Ready(Arc<CorrectionProfile>),
    Failed(Arc<str>),
}

/// Write-once slot for the batch's correction profile.
///
/// Tasks register continuations with [`ProfileCell::when_ready`] instead of
/// blocking a worker; continuations registered before resolution run on the
/// resolving thread, later ones run immediately on the caller's thread.
pub struct ProfileCell {
    state: Mutex<State>,
    resolved: Condvar,
    error: Mutex<Option<DebandError>>,
}

impl State {
    fn outcome(&self) -> Option<ProfileOutcome> {
        match self {
            State::Pending(_) => None,
            State::Ready(profile) => Some(Ok(profile.clone())),
            State::Failed(cause) => Some(Err(cause.clone())),
        }
    }
}

impl Default for ProfileCell {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileCell {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::Pending(Vec::new())),
            resolved: Condvar::new(),
            error: Mutex::new(None),
        }
    }

    /// Stores the result and runs every registered continuation.
    /// Only the first call has an effect.
    pub fn resolve(&self, result: Result<CorrectionProfile>) {
        let (outcome, waiters) = {
            let mut state = self.state.lock();
            if !matches!(*state, State::Pending(_)) {
                return;
            }
            let outcome: ProfileOutcome = match result {
                Ok(profile) => Ok(Arc::new(profile)),
                Err(e) => {
                    let cause: Arc<str> = e.to_string().into();
                    *self.error.lock() = Some(e);
                    Err(cause)
                }
            };
            let next = match &outcome {
                Ok(profile) => State::Ready(profile.clone()),
                Err(cause) => State::Failed(cause.clone()),
            };
            let waiters = match std::mem::replace(&mut *state, next) {
                State::Pending(waiters) => waiters,
                _ => Vec::new(),
            };
            (outcome, waiters)
        };
        self.resolved.notify_all();

        for waiter in waiters {
            waiter(outcome.clone());
        }
    }

    /// Runs `waiter` once the profile is resolved, without blocking the caller.
    pub fn when_ready<F>(&self, waiter: F)
    where
        F: FnOnce(ProfileOutcome) + Send + 'static,
    {
        let outcome = {
            let mut state = self.state.lock();
            match &mut *state {
                State::Pending(waiters) => {
                    waiters.push(Box::new(waiter));
                    return;
                }
                State::Ready(profile) => Ok(profile.clone()),
                State::Failed(cause) => Err(cause.clone()),
            }
        };
        waiter(outcome)
    }

    /// Failure cause, once the profile is known to be unavailable.
    pub fn failure(&self) -> Option<Arc<str>> {
        match &*self.state.lock() {
            State::Failed(cause) => Some(cause.clone()),
            _ => None,
        }
    }

    /// Blocks until resolved. Meant for the batch's completion barrier, never for workers.
    pub fn wait(&self) -> ProfileOutcome {
        let mut state = self.state.lock();
        loop {
            if let Some(outcome) = state.outcome() {
                return outcome;
            }
            self.resolved.wait(&mut state);
        }
    }

    /// Takes the original error the profile failed with.
    pub fn take_error(&self) -> Option<DebandError> {
        self.error.lock().take()
    }
}

/// Resolves the cell with a failure if dropped before [`PendingProfile::resolve`],
/// so a panicking analysis cannot leave dependents waiting forever.
pub struct PendingProfile {
    cell: Option<Arc<ProfileCell>>,
}

impl PendingProfile {
    pub fn new(cell: Arc<ProfileCell>) -> Self {
        Self { cell: Some(cell) }
    }

    pub fn resolve(mut self, result: Result<CorrectionProfile>) {
        if let Some(cell) = self.cell.take() {
            cell.resolve(result);
        }
    }
}

impl Drop for PendingProfile {
    fn drop(&mut self) {
        if let Some(cell) = self.cell.take() {
            cell.resolve(Err(DebandError::WorkerPool(
                "reference analysis stopped before producing a profile".to_string(),
            )));
        }
    }
}
