//! OS thread workers.
//!
//! [`ThreadPool`] owns a fixed set of named threads pulling jobs from one
//! bounded crossbeam queue. [`ThreadWorkers`] puts the [`WorkerPool`]
//! interface on top of it: every job reports through its own single-slot
//! result channel, and the pending receivers are kept in submission order.
//!
//! # Teardown
//!
//! Dropping the pool raises the cancel flag, closes the queue and joins every
//! thread. Jobs still queued are skipped; a job already running is allowed to
//! finish, since OS threads cannot be preempted.

use super::pool::{panic_error, PoolSettings, WorkerPool};
use crate::error::{Result, StreamError};
use crate::pipeline::id::Position;
use crossbeam_channel::{bounded, Receiver, Select, Sender};
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size pool of named OS threads.
pub struct ThreadPool {
    sender: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
    cancelled: Arc<AtomicBool>,
}

impl ThreadPool {
    /// Spawn `settings.workers` threads named `<prefix>-<index>`.
    pub fn new(settings: &PoolSettings) -> Result<Self> {
        let workers = settings.workers.max(1);
        let (sender, receiver) = bounded::<Task>(workers);
        let mut pool = Self {
            sender: Some(sender),
            workers: Vec::with_capacity(workers),
            cancelled: Arc::new(AtomicBool::new(false)),
        };

        for index in 0..workers {
            let receiver = receiver.clone();
            let cancelled = pool.cancelled.clone();
            // A failed spawn drops `pool`, which joins the threads already started.
            let handle = std::thread::Builder::new()
                .name(format!("{}-{}", settings.thread_name_prefix, index))
                .spawn(move || Self::worker_loop(receiver, cancelled))?;
            pool.workers.push(handle);
        }

        tracing::debug!(
            workers,
            prefix = %settings.thread_name_prefix,
            "thread pool started"
        );
        Ok(pool)
    }

    fn worker_loop(receiver: Receiver<Task>, cancelled: Arc<AtomicBool>) {
        while let Ok(task) = receiver.recv() {
            if cancelled.load(Ordering::Acquire) {
                continue;
            }
            task();
        }
    }

    /// Queue a task, blocking while the queue is full.
    pub fn execute(&self, task: impl FnOnce() + Send + 'static) -> Result<()> {
        let sender = self.sender.as_ref().ok_or(StreamError::Cancelled)?;
        sender
            .send(Box::new(task))
            .map_err(|_| StreamError::Cancelled)
    }

    /// Shared flag raised when the pool is torn down.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        self.sender.take();
        let mut joined = 0;
        for handle in self.workers.drain(..) {
            if handle.join().is_ok() {
                joined += 1;
            }
        }
        tracing::debug!(joined, "thread pool stopped");
    }
}

enum Pending<U> {
    Ready(Result<U>),
    Running(Receiver<Result<U>>),
}

/// [`WorkerPool`] backed by OS threads.
pub struct ThreadWorkers<U> {
    pending: VecDeque<(Position, Pending<U>)>,
    pool: ThreadPool,
}

impl<U: Send + 'static> ThreadWorkers<U> {
    fn take_ready(&mut self) -> Option<(Position, Result<U>)> {
        let index = self
            .pending
            .iter()
            .position(|(_, p)| matches!(p, Pending::Ready(_)))?;
        match self.pending.remove(index)? {
            (position, Pending::Ready(outcome)) => Some((position, outcome)),
            (position, Pending::Running(receiver)) => Some((position, Self::wait(&receiver))),
        }
    }

    fn wait(receiver: &Receiver<Result<U>>) -> Result<U> {
        receiver.recv().unwrap_or(Err(StreamError::Cancelled))
    }
}

impl<U: Send + 'static> WorkerPool for ThreadWorkers<U> {
    type Output = U;
    type Job = Box<dyn FnOnce() -> Result<U> + Send + 'static>;

    fn start(settings: &PoolSettings) -> Result<Self> {
        Ok(Self {
            pending: VecDeque::with_capacity(settings.workers),
            pool: ThreadPool::new(settings)?,
        })
    }

    fn submit(&mut self, position: Position, job: Self::Job) -> Result<()> {
        let (sender, receiver) = bounded(1);
        self.pool.execute(move || {
            let outcome = catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|payload| {
                Err(panic_error(payload))
            });
            // The receiver is gone once the stage has been dropped.
            let _ = sender.send(outcome);
        })?;
        tracing::trace!(%position, "job submitted");
        self.pending.push_back((position, Pending::Running(receiver)));
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
            Pending::Running(receiver) => Self::wait(&receiver),
        };
        Some((position, outcome))
    }

    fn await_first(&mut self) -> Option<(Position, Result<U>)> {
        if let Some(ready) = self.take_ready() {
            return Some(ready);
        }
        if self.pending.is_empty() {
            return None;
        }

        let (index, outcome) = {
            let running: Vec<(usize, &Receiver<Result<U>>)> = self
                .pending
                .iter()
                .enumerate()
                .filter_map(|(i, (_, p))| match p {
                    Pending::Running(receiver) => Some((i, receiver)),
                    Pending::Ready(_) => None,
                })
                .collect();

            let mut select = Select::new();
            for (_, receiver) in &running {
                select.recv(receiver);
            }
            let operation = select.select();
            let (index, receiver) = running[operation.index()];
            let outcome = operation
                .recv(receiver)
                .unwrap_or(Err(StreamError::Cancelled));
            (index, outcome)
        };

        let (position, _) = self.pending.remove(index)?;
        Some((position, outcome))
    }
}
