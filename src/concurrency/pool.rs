//! Worker pool interface shared by the thread and task schedulers.

use crate::error::{Result, StreamError};
use crate::pipeline::id::Position;
use std::any::Any;

/// Settings a pool is started with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub workers: usize,
    pub thread_name_prefix: String,
}

/// A pool of workers that runs jobs tagged with a sequence position.
///
/// Implementations keep submitted jobs in submission order so that
/// [`await_oldest`](WorkerPool::await_oldest) can restore it.
pub trait WorkerPool: Send + Sized {
    /// Result type of a job.
    type Output: Send + 'static;
    /// Unit of work accepted by [`submit`](WorkerPool::submit).
    type Job;

    /// Start the pool.
    fn start(settings: &PoolSettings) -> Result<Self>;

    /// Schedule `job` at `position`.
    fn submit(&mut self, position: Position, job: Self::Job) -> Result<()>;

    /// Record an outcome that needs no work, such as an upstream error,
    /// so it keeps its place in the window.
    fn submit_ready(&mut self, position: Position, outcome: Result<Self::Output>);

    /// Number of submitted outcomes not yet awaited.
    fn in_flight(&self) -> usize;

    /// Block until the oldest submitted job completes.
    fn await_oldest(&mut self) -> Option<(Position, Result<Self::Output>)>;

    /// Block until any submitted job completes.
    fn await_first(&mut self) -> Option<(Position, Result<Self::Output>)>;
}

/// Text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Convert a caught panic into the error reported at the task's position.
pub fn panic_error(payload: Box<dyn Any + Send>) -> StreamError {
    let message = panic_message(payload.as_ref());
    tracing::warn!(panic = %message, "work function panicked");
    StreamError::WorkerPanic(message)
}
