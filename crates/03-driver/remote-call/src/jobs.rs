use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::error::{DispatchError, DispatchResult};
use crate::signature::JobId;

/// Where the dispatcher gets argument buffers and delivers results.
pub trait JobChannel: Send + Sync {
    /// Takes the argument buffer submitted for `job`.
    fn consume(&self, job: JobId) -> DispatchResult<Vec<u8>>;

    /// Reports completion. `payload` is empty for void functions.
    fn produce(&self, job: JobId, payload: &[u8]) -> DispatchResult<()>;
}

impl<T: JobChannel + ?Sized> JobChannel for Arc<T> {
    fn consume(&self, job: JobId) -> DispatchResult<Vec<u8>> {
        (**self).consume(job)
    }

    fn produce(&self, job: JobId, payload: &[u8]) -> DispatchResult<()> {
        (**self).produce(job, payload)
    }
}

#[derive(Default)]
struct JobState {
    pending: HashMap<JobId, Vec<u8>>,
    results: HashMap<JobId, Vec<u8>>,
}

/// In-process [`JobChannel`]: callers submit buffers and wait for results.
#[derive(Default)]
pub struct JobQueue {
    state: Mutex<JobState>,
    completed: Condvar,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the argument buffer for `job`, replacing any unconsumed one.
    pub fn submit(&self, job: JobId, args: Vec<u8>) {
        self.state.lock().pending.insert(job, args);
    }

    /// Blocks until `job` completes and takes its result.
    pub fn wait_result(&self, job: JobId) -> Vec<u8> {
        let mut state = self.state.lock();
        loop {
            if let Some(result) = state.results.remove(&job) {
                return result;
            }
            self.completed.wait(&mut state);
        }
    }

    /// Like [`wait_result`](Self::wait_result) but gives up after `timeout`.
    pub fn wait_result_timeout(&self, job: JobId, timeout: Duration) -> Option<Vec<u8>> {
        let mut state = self.state.lock();
        loop {
            if let Some(result) = state.results.remove(&job) {
                return Some(result);
            }
            if self.completed.wait_for(&mut state, timeout).timed_out() {
                return state.results.remove(&job);
            }
        }
    }

    /// Argument buffers not yet consumed.
    pub fn pending(&self) -> usize {
        self.state.lock().pending.len()
    }
}

impl JobChannel for JobQueue {
    fn consume(&self, job: JobId) -> DispatchResult<Vec<u8>> {
        self.state
            .lock()
            .pending
            .remove(&job)
            .ok_or(DispatchError::MissingJob(job))
    }

    fn produce(&self, job: JobId, payload: &[u8]) -> DispatchResult<()> {
        self.state.lock().results.insert(job, payload.to_vec());
        self.completed.notify_all();
        Ok(())
    }
}
