use crate::concurrency::pool::panic_error;
use crate::concurrency::{Concurrency, ConcurrentFlatten};
use crate::error::Result;
use crate::pipeline::compiler::ExecutionBuilder;
use crate::pipeline::kind::StageKind;
use crate::pipeline::node::{Describe, Runnable, Stage, StageDescriptor};
use crate::pipeline::stream::Stream;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Flatten node — yields the elements of each upstream sequence in turn.
pub struct FlattenNode<I> {
    upstream: Stream<I>,
    concurrency: Option<Concurrency>,
    isolate_panics: bool,
}

impl<I> FlattenNode<I> {
    pub fn new(upstream: Stream<I>, concurrency: Option<Concurrency>) -> Self {
        // A single lane is the sequential operator.
        let isolate_panics = concurrency.is_some();
        let concurrency = concurrency.filter(|c| c.workers() > 1);
        Self {
            upstream,
            concurrency,
            isolate_panics,
        }
    }
}

impl<I> Describe for FlattenNode<I>
where
    I: IntoIterator + Send + 'static,
{
    fn descriptor(&self) -> StageDescriptor {
        match self.concurrency {
            None => StageDescriptor::new(StageKind::Flatten, "flatten"),
            Some(c) => {
                let descriptor = StageDescriptor::new(StageKind::ConcurrentFlatten, "par_flatten")
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

impl<I> Stage<I::Item> for FlattenNode<I>
where
    I: IntoIterator + Send + 'static,
    I::IntoIter: Send + 'static,
    I::Item: Send + 'static,
{
    fn build(&self, builder: &ExecutionBuilder<'_>) -> Runnable<I::Item> {
        let upstream = builder.build(&self.upstream);
        match self.concurrency {
            None => Box::new(FlattenIter {
                upstream,
                current: None,
                isolate_panics: self.isolate_panics,
            }),
            Some(c) => Box::new(ConcurrentFlatten::new(
                upstream,
                c.settings(builder.config()),
                builder.config().concurrency.flatten_lane_capacity,
                c.resolve_order(builder.config()),
            )),
        }
    }
}

struct FlattenIter<I: IntoIterator> {
    upstream: Runnable<I>,
    current: Option<I::IntoIter>,
    isolate_panics: bool,
}

impl<I: IntoIterator> Iterator for FlattenIter<I> {
    type Item = Result<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(inner) = self.current.as_mut() {
                let item = if self.isolate_panics {
                    match catch_unwind(AssertUnwindSafe(|| inner.next())) {
                        Ok(item) => item,
                        Err(payload) => {
                            self.current = None;
                            return Some(Err(panic_error(payload)));
                        }
                    }
                } else {
                    inner.next()
                };
                if let Some(item) = item {
                    return Some(Ok(item));
                }
                self.current = None;
            }
            match self.upstream.next()? {
                Ok(sequence) => self.current = Some(sequence.into_iter()),
                Err(err) => return Some(Err(err)),
            }
        }
    }
}
