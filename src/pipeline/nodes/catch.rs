//! CatchNode — error interception stage.
//!
//! Matching errors are suppressed (or replaced by a value). With
//! `finally_raise`, the first matching error is kept and emitted once after
//! upstream ends. Errors that do not match pass through untouched.

use crate::error::{Result, StreamError};
use crate::pipeline::compiler::ExecutionBuilder;
use crate::pipeline::kind::StageKind;
use crate::pipeline::node::{callable_name, Describe, Runnable, Stage, StageDescriptor};
use crate::pipeline::stream::Stream;
use std::sync::Arc;

type ErrorPredicate = Arc<dyn Fn(&StreamError) -> bool + Send + Sync>;
type Replacement<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// Which errors a catch stage intercepts and what it does with them.
pub struct CatchSpec<T> {
    kind: ErrorPredicate,
    kind_name: String,
    when: Option<ErrorPredicate>,
    replacement: Option<Replacement<T>>,
    finally_raise: bool,
}

impl<T> CatchSpec<T> {
    /// Catch errors whose underlying type is `E`.
    pub fn kind<E>() -> Self
    where
        E: std::error::Error + 'static,
    {
        Self {
            kind: Arc::new(|err: &StreamError| err.is::<E>()),
            kind_name: callable_name::<E>(),
            when: None,
            replacement: None,
            finally_raise: false,
        }
    }

    /// Catch every error.
    pub fn any() -> Self {
        Self {
            kind: Arc::new(|_: &StreamError| true),
            kind_name: "any".to_string(),
            when: None,
            replacement: None,
            finally_raise: false,
        }
    }

    /// Only catch errors that also satisfy `predicate`.
    pub fn when<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&StreamError) -> bool + Send + Sync + 'static,
    {
        self.when = Some(Arc::new(predicate));
        self
    }

    /// Yield `value` in place of each caught error.
    pub fn replacement(mut self, value: T) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        self.replacement = Some(Arc::new(move || value.clone()));
        self
    }

    /// Emit the first caught error once upstream ends.
    pub fn finally_raise(mut self, finally_raise: bool) -> Self {
        self.finally_raise = finally_raise;
        self
    }

    fn matches(&self, err: &StreamError) -> bool {
        (self.kind)(err) && self.when.as_ref().map_or(true, |when| when(err))
    }
}

impl<T> Clone for CatchSpec<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind.clone(),
            kind_name: self.kind_name.clone(),
            when: self.when.clone(),
            replacement: self.replacement.clone(),
            finally_raise: self.finally_raise,
        }
    }
}

/// Catch node.
pub struct CatchNode<T> {
    upstream: Stream<T>,
    spec: CatchSpec<T>,
}

impl<T> CatchNode<T> {
    pub fn new(upstream: Stream<T>, spec: CatchSpec<T>) -> Self {
        Self { upstream, spec }
    }
}

impl<T: Send + 'static> Describe for CatchNode<T> {
    fn descriptor(&self) -> StageDescriptor {
        let mut descriptor =
            StageDescriptor::new(StageKind::Catch, "catch").label(self.spec.kind_name.clone());
        if self.spec.when.is_some() {
            descriptor = descriptor.param("when", "<predicate>");
        }
        if self.spec.replacement.is_some() {
            descriptor = descriptor.param("replacement", true);
        }
        if self.spec.finally_raise {
            descriptor = descriptor.param("finally_raise", true);
        }
        descriptor
    }

    fn upstream(&self) -> Option<&dyn Describe> {
        Some(&self.upstream)
    }
}

impl<T: Send + 'static> Stage<T> for CatchNode<T> {
    fn build(&self, builder: &ExecutionBuilder<'_>) -> Runnable<T> {
        Box::new(CatchIter {
            upstream: Some(builder.build(&self.upstream)),
            spec: self.spec.clone(),
            first_error: None,
            caught: 0,
        })
    }
}

struct CatchIter<T> {
    upstream: Option<Runnable<T>>,
    spec: CatchSpec<T>,
    first_error: Option<StreamError>,
    caught: u64,
}

impl<T> Iterator for CatchIter<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.upstream.as_mut()?.next() {
                Some(Ok(value)) => return Some(Ok(value)),
                Some(Err(err)) if self.spec.matches(&err) => {
                    self.caught += 1;
                    tracing::debug!(error = %err, caught = self.caught, "caught error");
                    if self.spec.finally_raise && self.first_error.is_none() {
                        self.first_error = Some(err);
                    }
                    if let Some(replacement) = &self.spec.replacement {
                        return Some(Ok(replacement()));
                    }
                }
                Some(Err(err)) => return Some(Err(err)),
                None => {
                    self.upstream = None;
                    return self.first_error.take().map(Err);
                }
            }
        }
    }
}
