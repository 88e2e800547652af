use crate::concurrency::coordinator::JobFactory;
use crate::concurrency::pool::panic_error;
use crate::concurrency::tasks::BoxFuture;
use crate::concurrency::{Concurrency, ConcurrentMap, TaskWorkers, ThreadWorkers};
use crate::error::Result;
use crate::pipeline::compiler::ExecutionBuilder;
use crate::pipeline::kind::StageKind;
use crate::pipeline::node::{Describe, Runnable, Stage, StageDescriptor};
use crate::pipeline::stream::Stream;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Work function of a map stage.
pub type MapFn<T, U> = Arc<dyn Fn(T) -> Result<U> + Send + Sync>;

/// Async work function of a cooperative map stage.
pub type AsyncMapFn<T, U> = Arc<dyn Fn(T) -> BoxFuture<U> + Send + Sync>;

type ThreadJob<U> = Box<dyn FnOnce() -> Result<U> + Send + 'static>;

/// Where a map stage runs its work function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    /// On the consumer's thread, one element at a time
    Sequential,
    /// On a pool of OS threads
    Threads(Concurrency),
}

/// Map stage, sequential or on OS threads.
pub struct MapNode<T, U> {
    upstream: Stream<T>,
    f: MapFn<T, U>,
    execution: Execution,
    /// Panics become `WorkerPanic` errors, as they do on a pool
    isolate_panics: bool,
    name: &'static str,
    label: String,
}

impl<T, U> MapNode<T, U> {
    pub fn new(
        upstream: Stream<T>,
        f: MapFn<T, U>,
        execution: Execution,
        name: &'static str,
        label: String,
    ) -> Self {
        // A single worker behaves exactly like the sequential operator.
        let isolate_panics = matches!(execution, Execution::Threads(_));
        let execution = match execution {
            Execution::Threads(c) if c.workers() == 1 => Execution::Sequential,
            other => other,
        };
        Self {
            upstream,
            f,
            execution,
            isolate_panics,
            name,
            label,
        }
    }
}

impl<T: Send + 'static, U: Send + 'static> Describe for MapNode<T, U> {
    fn descriptor(&self) -> StageDescriptor {
        match self.execution {
            Execution::Sequential => {
                StageDescriptor::new(StageKind::Map, self.name).label(self.label.clone())
            }
            Execution::Threads(c) => {
                let descriptor = StageDescriptor::new(StageKind::ConcurrentMap, self.name)
                    .label(self.label.clone())
                    .workers(c.workers());
                match c.order() {
                    Some(order) => descriptor.param("order", order),
                    None => descriptor,
                }
            }
        }
    }

    fn upstream(&self) -> Option<&dyn Describe> {
        Some(&self.upstream)
    }
}

impl<T: Send + 'static, U: Send + 'static> Stage<U> for MapNode<T, U> {
    fn build(&self, builder: &ExecutionBuilder<'_>) -> Runnable<U> {
        let upstream = builder.build(&self.upstream);
        match self.execution {
            Execution::Sequential => Box::new(MapIter {
                upstream,
                f: self.f.clone(),
                isolate_panics: self.isolate_panics,
            }),
            Execution::Threads(concurrency) => {
                let f = self.f.clone();
                let job: JobFactory<T, ThreadJob<U>> = Arc::new(move |value: T| -> ThreadJob<U> {
                    let f = f.clone();
                    Box::new(move || f(value))
                });
                Box::new(ConcurrentMap::<T, ThreadWorkers<U>>::new(
                    upstream,
                    job,
                    concurrency.settings(builder.config()),
                    concurrency.resolve_order(builder.config()),
                ))
            }
        }
    }
}

/// Sequential map runnable.
pub struct MapIter<T, U> {
    upstream: Runnable<T>,
    f: MapFn<T, U>,
    isolate_panics: bool,
}

impl<T, U> Iterator for MapIter<T, U> {
    type Item = Result<U>;

    fn next(&mut self) -> Option<Self::Item> {
        let value = match self.upstream.next()? {
            Ok(value) => value,
            Err(err) => return Some(Err(err)),
        };
        if !self.isolate_panics {
            return Some((self.f)(value));
        }
        let f = &*self.f;
        let outcome = catch_unwind(AssertUnwindSafe(|| f(value)));
        Some(outcome.unwrap_or_else(|payload| Err(panic_error(payload))))
    }
}

/// Map stage running async work functions as cooperative tasks.
pub struct AsyncMapNode<T, U> {
    upstream: Stream<T>,
    f: AsyncMapFn<T, U>,
    concurrency: Concurrency,
    name: &'static str,
    label: String,
}

impl<T, U> AsyncMapNode<T, U> {
    pub fn new(
        upstream: Stream<T>,
        f: AsyncMapFn<T, U>,
        concurrency: Concurrency,
        name: &'static str,
        label: String,
    ) -> Self {
        Self {
            upstream,
            f,
            concurrency,
            name,
            label,
        }
    }
}

impl<T: Send + 'static, U: Send + 'static> Describe for AsyncMapNode<T, U> {
    fn descriptor(&self) -> StageDescriptor {
        let descriptor = StageDescriptor::new(StageKind::ConcurrentMap, self.name)
            .label(self.label.clone())
            .workers(self.concurrency.workers())
            .param("scheduler", "tasks");
        match self.concurrency.order() {
            Some(order) => descriptor.param("order", order),
            None => descriptor,
        }
    }

    fn upstream(&self) -> Option<&dyn Describe> {
        Some(&self.upstream)
    }
}

impl<T: Send + 'static, U: Send + 'static> Stage<U> for AsyncMapNode<T, U> {
    fn build(&self, builder: &ExecutionBuilder<'_>) -> Runnable<U> {
        let job: JobFactory<T, BoxFuture<U>> = self.f.clone();
        Box::new(ConcurrentMap::<T, TaskWorkers<U>>::new(
            builder.build(&self.upstream),
            job,
            self.concurrency.settings(builder.config()),
            self.concurrency.resolve_order(builder.config()),
        ))
    }
}
