//! FilterNode — predicate filtering stage.
//!
//! Pulls upstream until a value passes the predicate, an error arrives, or
//! the stream ends. Errors are never filtered.

use crate::error::Result;
use crate::pipeline::compiler::ExecutionBuilder;
use crate::pipeline::kind::StageKind;
use crate::pipeline::node::{Describe, Runnable, Stage, StageDescriptor};
use crate::pipeline::stream::Stream;
use std::sync::Arc;

pub type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Filter node — keeps values for which the predicate holds.
pub struct FilterNode<T> {
    upstream: Stream<T>,
    predicate: Predicate<T>,
    label: String,
}

impl<T> FilterNode<T> {
    pub fn new(upstream: Stream<T>, predicate: Predicate<T>, label: String) -> Self {
        Self {
            upstream,
            predicate,
            label,
        }
    }
}

impl<T: Send + 'static> Describe for FilterNode<T> {
    fn descriptor(&self) -> StageDescriptor {
        StageDescriptor::new(StageKind::Filter, "filter").label(self.label.clone())
    }

    fn upstream(&self) -> Option<&dyn Describe> {
        Some(&self.upstream)
    }
}

impl<T: Send + 'static> Stage<T> for FilterNode<T> {
    fn build(&self, builder: &ExecutionBuilder<'_>) -> Runnable<T> {
        Box::new(FilterIter {
            upstream: builder.build(&self.upstream),
            predicate: self.predicate.clone(),
        })
    }
}

struct FilterIter<T> {
    upstream: Runnable<T>,
    predicate: Predicate<T>,
}

impl<T> Iterator for FilterIter<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.upstream.next()? {
                Ok(value) if !(self.predicate)(&value) => continue,
                outcome => return Some(outcome),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Stream;

    #[test]
    fn test_filter_keeps_matching_values() {
        let out: Vec<i32> = Stream::new(1..=10)
            .filter(|x| x % 3 == 0)
            .iter()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(out, vec![3, 6, 9]);
    }

    #[test]
    fn test_filter_passes_errors() {
        let outcomes: Vec<bool> = Stream::try_from_fn(|| vec![Ok(1), Err("boom"), Ok(2)])
            .filter(|_| false)
            .catch_with(crate::CatchSpec::any().replacement(0))
            .iter()
            .map(|r| r.is_ok())
            .collect();
        assert_eq!(outcomes, vec![true]);
    }
}
