//! Cooperative task workers.
//!
//! Jobs are futures spawned on a tokio current-thread runtime owned by the
//! stage. Nothing runs in the background: tasks only make progress while the
//! consumer's thread blocks in [`await_oldest`](WorkerPool::await_oldest) or
//! [`await_first`](WorkerPool::await_first), and they switch only at their own
//! `.await` points.
//!
//! Iterating a stream with cooperative stages from inside another tokio
//! runtime is not supported, since the stage blocks its thread on its own
//! runtime.

use super::pool::{panic_error, PoolSettings, WorkerPool};
use crate::error::{Result, StreamError};
use crate::pipeline::id::Position;
use std::collections::VecDeque;
use std::future::{poll_fn, Future};
use std::pin::Pin;
use std::task::Poll;
use tokio::runtime::{Builder, Runtime};
use tokio::task::{JoinError, JoinHandle};

/// Boxed future produced by an async work function.
pub type BoxFuture<U> = Pin<Box<dyn Future<Output = Result<U>> + Send + 'static>>;

enum Pending<U> {
    Ready(Result<U>),
    Spawned(JoinHandle<Result<U>>),
}

/// [`WorkerPool`] backed by a single-threaded tokio runtime.
pub struct TaskWorkers<U> {
    pending: VecDeque<(Position, Pending<U>)>,
    runtime: Runtime,
}

impl<U: Send + 'static> TaskWorkers<U> {
    fn joined(result: std::result::Result<Result<U>, JoinError>) -> Result<U> {
        match result {
            Ok(outcome) => outcome,
            Err(err) if err.is_panic() => Err(panic_error(err.into_panic())),
            Err(_) => Err(StreamError::Cancelled),
        }
    }
}

impl<U: Send + 'static> WorkerPool for TaskWorkers<U> {
    type Output = U;
    type Job = BoxFuture<U>;

    fn start(settings: &PoolSettings) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_time().build()?;
        tracing::debug!(workers = settings.workers, "task runtime started");
        Ok(Self {
            pending: VecDeque::with_capacity(settings.workers),
            runtime,
        })
    }

    fn submit(&mut self, position: Position, job: Self::Job) -> Result<()> {
        let handle = self.runtime.spawn(job);
        tracing::trace!(%position, "task spawned");
        self.pending.push_back((position, Pending::Spawned(handle)));
        Ok(())
    }

    fn submit_ready(&mut self, position: Position, outcome: Result<U>) {
        self.pending.push_back((position, Pending::Ready(outcome)));
    }

    fn in_flight(&self) -> usize {
        self.pending.len()
    }

    fn await_oldest(&mut self) -> Option<(Position, Result<U>)> {
        let (position, pending) = self.pending.pop_front()?;
        let outcome = match pending {
            Pending::Ready(outcome) => outcome,
            Pending::Spawned(handle) => Self::joined(self.runtime.block_on(handle)),
        };
        Some((position, outcome))
    }

    fn await_first(&mut self) -> Option<(Position, Result<U>)> {
        if let Some(index) = self
            .pending
            .iter()
            .position(|(_, p)| matches!(p, Pending::Ready(_)))
        {
            return match self.pending.remove(index)? {
                (position, Pending::Ready(outcome)) => Some((position, outcome)),
                (position, Pending::Spawned(handle)) => {
                    Some((position, Self::joined(self.runtime.block_on(handle))))
                }
            };
        }
        if self.pending.is_empty() {
            return None;
        }

        let pending = &mut self.pending;
        let (index, result) = self.runtime.block_on(poll_fn(|cx| {
            for (index, (_, entry)) in pending.iter_mut().enumerate() {
                if let Pending::Spawned(handle) = entry {
                    if let Poll::Ready(result) = Pin::new(handle).poll(cx) {
                        return Poll::Ready((index, result));
                    }
                }
            }
            Poll::Pending
        }));

        let (position, _) = self.pending.remove(index)?;
        Some((position, Self::joined(result)))
    }
}

impl<U> Drop for TaskWorkers<U> {
    fn drop(&mut self) {
        let mut aborted = 0;
        for (_, pending) in self.pending.drain(..) {
            if let Pending::Spawned(handle) = pending {
                handle.abort();
                aborted += 1;
            }
        }
        tracing::debug!(aborted, "task runtime stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn settings(workers: usize) -> PoolSettings {
        PoolSettings {
            workers,
            thread_name_prefix: "unused".to_string(),
        }
    }

    fn delayed(value: u64, delay_ms: u64) -> BoxFuture<u64> {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            Ok(value)
        })
    }

    #[test]
    fn test_await_oldest_restores_order() {
        let mut workers = TaskWorkers::<u64>::start(&settings(3)).unwrap();
        workers.submit(Position(0), delayed(0, 30)).unwrap();
        workers.submit(Position(1), delayed(1, 10)).unwrap();
        workers.submit(Position(2), delayed(2, 0)).unwrap();

        let order: Vec<u64> = std::iter::from_fn(|| workers.await_oldest())
            .map(|(_, outcome)| outcome.unwrap())
            .collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_tasks_interleave_on_one_thread() {
        let mut workers = TaskWorkers::<u64>::start(&settings(4)).unwrap();
        let started = std::time::Instant::now();
        for i in 0..4 {
            workers.submit(Position(i), delayed(i, 50)).unwrap();
        }
        while workers.await_oldest().is_some() {}
        // Four 50ms sleeps overlap instead of adding up.
        assert!(started.elapsed() < Duration::from_millis(180));
    }

    #[test]
    fn test_await_first() {
        let mut workers = TaskWorkers::<u64>::start(&settings(2)).unwrap();
        workers.submit(Position(0), delayed(0, 100)).unwrap();
        workers.submit(Position(1), delayed(1, 0)).unwrap();

        let (position, outcome) = workers.await_first().unwrap();
        assert_eq!(position, Position(1));
        assert_eq!(outcome.unwrap(), 1);
        assert_eq!(workers.in_flight(), 1);
    }

    fn explode() -> Result<u64> {
        panic!("task exploded")
    }

    #[test]
    fn test_panic_becomes_error() {
        let mut workers = TaskWorkers::<u64>::start(&settings(1)).unwrap();
        workers
            .submit(Position(0), Box::pin(async { explode() }))
            .unwrap();
        let (_, outcome) = workers.await_oldest().unwrap();
        assert!(matches!(outcome, Err(StreamError::WorkerPanic(ref m)) if m == "task exploded"));
    }

    #[test]
    fn test_drop_cancels_pending_tasks() {
        let finished = Arc::new(AtomicUsize::new(0));
        let mut workers = TaskWorkers::<u64>::start(&settings(2)).unwrap();
        for i in 0..2 {
            let finished = finished.clone();
            workers
                .submit(
                    Position(i),
                    Box::pin(async move {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        finished.fetch_add(1, Ordering::SeqCst);
                        Ok(i)
                    }),
                )
                .unwrap();
        }
        drop(workers);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }
}
