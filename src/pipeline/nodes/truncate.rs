use crate::error::Result;
use crate::pipeline::compiler::ExecutionBuilder;
use crate::pipeline::kind::StageKind;
use crate::pipeline::node::{Describe, Runnable, Stage, StageDescriptor};
use crate::pipeline::nodes::filter::Predicate;
use crate::pipeline::stream::Stream;

/// When a truncate stage ends the stream.
pub enum Limit<T> {
    /// After this many values
    Count(usize),
    /// At the first value matching the predicate, which is not emitted
    When(Predicate<T>, String),
}

impl<T> Clone for Limit<T> {
    fn clone(&self) -> Self {
        match self {
            Limit::Count(count) => Limit::Count(*count),
            Limit::When(predicate, label) => Limit::When(predicate.clone(), label.clone()),
        }
    }
}

/// Truncate node — ends the stream early.
pub struct TruncateNode<T> {
    upstream: Stream<T>,
    limit: Limit<T>,
}

impl<T> TruncateNode<T> {
    pub fn new(upstream: Stream<T>, limit: Limit<T>) -> Self {
        Self { upstream, limit }
    }
}

impl<T: Send + 'static> Describe for TruncateNode<T> {
    fn descriptor(&self) -> StageDescriptor {
        let descriptor = StageDescriptor::new(StageKind::Truncate, "truncate");
        match &self.limit {
            Limit::Count(count) => descriptor.param("count", count),
            Limit::When(_, label) => descriptor.param("when", label),
        }
    }

    fn upstream(&self) -> Option<&dyn Describe> {
        Some(&self.upstream)
    }
}

impl<T: Send + 'static> Stage<T> for TruncateNode<T> {
    fn build(&self, builder: &ExecutionBuilder<'_>) -> Runnable<T> {
        let mut iter = TruncateIter {
            upstream: Some(builder.build(&self.upstream)),
            limit: self.limit.clone(),
            emitted: 0,
        };
        if matches!(self.limit, Limit::Count(0)) {
            iter.upstream = None;
        }
        Box::new(iter)
    }
}

struct TruncateIter<T> {
    upstream: Option<Runnable<T>>,
    limit: Limit<T>,
    emitted: usize,
}

impl<T> TruncateIter<T> {
    /// Enter the terminal state and release the upstream chain.
    fn stop(&mut self) -> Option<Result<T>> {
        if self.upstream.take().is_some() {
            tracing::trace!(emitted = self.emitted, "stream truncated");
        }
        None
    }
}

impl<T> Iterator for TruncateIter<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let outcome = match self.upstream.as_mut()?.next() {
            Some(outcome) => outcome,
            None => return self.stop(),
        };
        let value = match outcome {
            Ok(value) => value,
            Err(err) => return Some(Err(err)),
        };

        match &self.limit {
            Limit::When(stop_when, _) if stop_when(&value) => return self.stop(),
            _ => {}
        }

        self.emitted += 1;
        if let Limit::Count(count) = self.limit {
            if self.emitted >= count {
                self.upstream = None;
            }
        }
        Some(Ok(value))
    }
}
