//! GroupNode — batches consecutive elements.
//!
//! Triggers can be combined; whichever fires first flushes the buffer:
//! - **size**: the buffer holds `size` elements
//! - **interval**: `interval` has passed since the buffer was started
//! - **key**: an element's key differs from the buffer's key; that element
//!   starts the next buffer
//!
//! The buffer is also flushed when upstream ends and before an upstream
//! error is passed on. Batches are never empty.

use crate::error::{Result, StreamError};
use crate::pipeline::compiler::ExecutionBuilder;
use crate::pipeline::kind::StageKind;
use crate::pipeline::node::{callable_name, Describe, Runnable, Stage, StageDescriptor};
use crate::pipeline::nodes::distinct::KeyFn;
use crate::pipeline::stream::Stream;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Flush triggers of a group stage.
pub struct Grouping<T, K = ()> {
    size: Option<usize>,
    interval: Option<Duration>,
    by: Option<(KeyFn<T, K>, String)>,
}

impl<T> Grouping<T> {
    /// No trigger yet: everything up to the end of the stream is one batch.
    pub fn new() -> Self {
        Self {
            size: None,
            interval: None,
            by: None,
        }
    }
}

impl<T> Default for Grouping<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, K> Grouping<T, K> {
    pub fn size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Group consecutive runs of elements sharing a key.
    pub fn by<K2, F>(self, key: F) -> Grouping<T, K2>
    where
        F: Fn(&T) -> K2 + Send + Sync + 'static,
    {
        Grouping {
            size: self.size,
            interval: self.interval,
            by: Some((Arc::new(key), callable_name::<F>())),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.size == Some(0) {
            return Err(StreamError::Configuration(
                "group size must be at least 1".to_string(),
            ));
        }
        if self.interval.is_some_and(|i| i.is_zero()) {
            return Err(StreamError::Timing(
                "group interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    fn kind(&self) -> StageKind {
        if self.by.is_some() {
            StageKind::GroupByKey
        } else if self.size.is_some() {
            StageKind::GroupBySize
        } else {
            StageKind::GroupByInterval
        }
    }
}

impl<T, K> Clone for Grouping<T, K> {
    fn clone(&self) -> Self {
        Self {
            size: self.size,
            interval: self.interval,
            by: self.by.clone(),
        }
    }
}

/// Group node.
pub struct GroupNode<T, K> {
    upstream: Stream<T>,
    grouping: Grouping<T, K>,
}

impl<T, K> GroupNode<T, K> {
    pub fn new(upstream: Stream<T>, grouping: Grouping<T, K>) -> Self {
        Self { upstream, grouping }
    }
}

impl<T, K> GroupNode<T, K>
where
    T: Send + 'static,
    K: PartialEq + Send + 'static,
{
    fn describe(&self, name: &'static str) -> StageDescriptor {
        let mut descriptor = StageDescriptor::new(self.grouping.kind(), name);
        if let Some((_, label)) = &self.grouping.by {
            descriptor = descriptor.param("by", label);
        }
        if let Some(size) = self.grouping.size {
            descriptor = descriptor.param("size", size);
        }
        if let Some(interval) = self.grouping.interval {
            descriptor = descriptor.param("interval", format!("{:?}", interval));
        }
        descriptor
    }

    fn runnable(&self, builder: &ExecutionBuilder<'_>) -> GroupIter<T, K> {
        GroupIter {
            upstream: Some(builder.build(&self.upstream)),
            grouping: self.grouping.clone(),
            buffer: Vec::new(),
            buffer_key: None,
            carry: None,
            pending_error: None,
            deadline: None,
        }
    }
}

impl<T, K> Describe for GroupNode<T, K>
where
    T: Send + 'static,
    K: PartialEq + Send + 'static,
{
    fn descriptor(&self) -> StageDescriptor {
        self.describe("group")
    }

    fn upstream(&self) -> Option<&dyn Describe> {
        Some(&self.upstream)
    }
}

impl<T, K> Stage<Vec<T>> for GroupNode<T, K>
where
    T: Send + 'static,
    K: PartialEq + Send + 'static,
{
    fn build(&self, builder: &ExecutionBuilder<'_>) -> Runnable<Vec<T>> {
        let mut batches = self.runnable(builder);
        Box::new(std::iter::from_fn(move || {
            batches.next_batch().map(|outcome| outcome.map(|(_, batch)| batch))
        }))
    }
}

/// Group node yielding each run together with its key.
pub struct KeyedGroupNode<T, K>(GroupNode<T, K>);

impl<T, K> KeyedGroupNode<T, K> {
    pub fn new<F>(upstream: Stream<T>, key: F, grouping: Grouping<T>) -> Self
    where
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        Self(GroupNode::new(upstream, grouping.by(key)))
    }
}

impl<T, K> Describe for KeyedGroupNode<T, K>
where
    T: Send + 'static,
    K: PartialEq + Send + 'static,
{
    fn descriptor(&self) -> StageDescriptor {
        self.0.describe("group_by")
    }

    fn upstream(&self) -> Option<&dyn Describe> {
        Some(&self.0.upstream)
    }
}

impl<T, K> Stage<(K, Vec<T>)> for KeyedGroupNode<T, K>
where
    T: Send + 'static,
    K: PartialEq + Send + 'static,
{
    fn build(&self, builder: &ExecutionBuilder<'_>) -> Runnable<(K, Vec<T>)> {
        let mut batches = self.0.runnable(builder);
        // Every element gets a key here, so no batch is keyless.
        Box::new(std::iter::from_fn(move || loop {
            match batches.next_batch()? {
                Ok((Some(key), batch)) => return Some(Ok((key, batch))),
                Ok((None, _)) => continue,
                Err(err) => return Some(Err(err)),
            }
        }))
    }
}

struct GroupIter<T, K> {
    upstream: Option<Runnable<T>>,
    grouping: Grouping<T, K>,
    buffer: Vec<T>,
    buffer_key: Option<K>,
    /// Element that ended the previous run, with its key
    carry: Option<(T, K)>,
    /// Error held back until the buffer in front of it is emitted
    pending_error: Option<StreamError>,
    deadline: Option<Instant>,
}

type Batch<T, K> = (Option<K>, Vec<T>);

impl<T, K: PartialEq> GroupIter<T, K> {
    fn arm(&mut self) {
        self.deadline = self.grouping.interval.map(|i| Instant::now() + i);
    }

    fn flush(&mut self) -> Option<Result<Batch<T, K>>> {
        self.arm();
        if self.buffer.is_empty() {
            return None;
        }
        let batch = std::mem::take(&mut self.buffer);
        tracing::trace!(size = batch.len(), "flushing batch");
        Some(Ok((self.buffer_key.take(), batch)))
    }

    fn interval_elapsed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    fn pull(&mut self) -> Option<Result<T>> {
        let next = self.upstream.as_mut()?.next();
        if next.is_none() {
            self.upstream = None;
        }
        next
    }

    fn next_batch(&mut self) -> Option<Result<Batch<T, K>>> {
        if let Some(err) = self.pending_error.take() {
            return Some(Err(err));
        }
        if self.deadline.is_none() {
            self.arm();
        }

        loop {
            let (value, key) = match self.carry.take() {
                Some((value, key)) => (value, Some(key)),
                None => match self.pull() {
                    Some(Ok(value)) => {
                        let key = self.grouping.by.as_ref().map(|(f, _)| f(&value));
                        (value, key)
                    }
                    Some(Err(err)) => {
                        if self.buffer.is_empty() {
                            return Some(Err(err));
                        }
                        self.pending_error = Some(err);
                        return self.flush();
                    }
                    None => return self.flush(),
                },
            };

            if let Some(key) = key {
                if !self.buffer.is_empty() && self.buffer_key.as_ref() != Some(&key) {
                    self.carry = Some((value, key));
                    return self.flush();
                }
                self.buffer_key = Some(key);
            }

            self.buffer.push(value);

            let full = self.grouping.size.is_some_and(|s| self.buffer.len() >= s);
            if full || self.interval_elapsed() {
                return self.flush();
            }
        }
    }
}
