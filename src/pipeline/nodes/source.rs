use crate::error::{BoxError, StreamError};
use crate::pipeline::compiler::ExecutionBuilder;
use crate::pipeline::kind::StageKind;
use crate::pipeline::node::{Describe, Runnable, Stage, StageDescriptor};
use crate::pipeline::stream::Stream;
use std::sync::Arc;

type Factory<T> = Arc<dyn Fn() -> Runnable<T> + Send + Sync>;

/// Root node wrapping an element source.
///
/// The factory runs once per iteration session, so every session starts
/// from the beginning of the source.
pub struct SourceNode<T> {
    factory: Factory<T>,
    label: String,
}

impl<T: Send + 'static> SourceNode<T> {
    /// Source cloned at the start of every session.
    pub fn from_iterable<I>(iterable: I, label: String) -> Self
    where
        I: IntoIterator<Item = T> + Clone + Send + Sync + 'static,
        I::IntoIter: Send + 'static,
    {
        Self {
            factory: Arc::new(move || Box::new(iterable.clone().into_iter().map(Ok))),
            label,
        }
    }

    /// Source produced by `factory` at the start of every session.
    pub fn from_factory<F, I>(factory: F, label: String) -> Self
    where
        F: Fn() -> I + Send + Sync + 'static,
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        Self {
            factory: Arc::new(move || Box::new(factory().into_iter().map(Ok))),
            label,
        }
    }

    /// Source whose elements may be errors.
    pub fn from_fallible<F, I, E>(factory: F, label: String) -> Self
    where
        F: Fn() -> I + Send + Sync + 'static,
        I: IntoIterator<Item = std::result::Result<T, E>>,
        I::IntoIter: Send + 'static,
        E: Into<BoxError>,
    {
        Self {
            factory: Arc::new(move || {
                Box::new(
                    factory()
                        .into_iter()
                        .map(|item| item.map_err(StreamError::upstream)),
                )
            }),
            label,
        }
    }
}

impl<T: Send + 'static> Describe for SourceNode<T> {
    fn descriptor(&self) -> StageDescriptor {
        StageDescriptor::new(StageKind::Source, "source").label(self.label.clone())
    }

    fn upstream(&self) -> Option<&dyn Describe> {
        None
    }
}

impl<T: Send + 'static> Stage<T> for SourceNode<T> {
    fn build(&self, _builder: &ExecutionBuilder<'_>) -> Runnable<T> {
        (self.factory)()
    }
}

/// Root node concatenating two streams.
pub struct ChainNode<T> {
    first: Stream<T>,
    second: Stream<T>,
}

impl<T> ChainNode<T> {
    pub fn new(first: Stream<T>, second: Stream<T>) -> Self {
        Self { first, second }
    }
}

impl<T: Send + 'static> Describe for ChainNode<T> {
    fn descriptor(&self) -> StageDescriptor {
        let depth = |s: &Stream<T>| crate::pipeline::compiler::PipelineCompiler::compile(s).stats.depth;
        StageDescriptor::new(StageKind::Source, "chain")
            .param("first_depth", depth(&self.first))
            .param("second_depth", depth(&self.second))
    }

    fn upstream(&self) -> Option<&dyn Describe> {
        None
    }
}

impl<T: Send + 'static> Stage<T> for ChainNode<T> {
    fn build(&self, builder: &ExecutionBuilder<'_>) -> Runnable<T> {
        // The second stream is only built once the first one has ended.
        let second = self.second.clone();
        let config = builder.config().clone();
        let mut second_started = false;
        let tail = std::iter::from_fn(move || {
            if second_started {
                return None;
            }
            second_started = true;
            Some(ExecutionBuilder::new(&config).build(&second))
        })
        .flatten();
        Box::new(builder.build(&self.first).chain(tail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn drain<T>(mut runnable: Runnable<T>) -> Vec<T> {
        let mut out = Vec::new();
        while let Some(item) = runnable.next() {
            out.push(item.unwrap());
        }
        out
    }

    #[test]
    fn test_iterable_restarts_each_session() {
        let node = SourceNode::from_iterable(vec![1, 2, 3], "Vec".to_string());
        let config = EngineConfig::default();
        let builder = ExecutionBuilder::new(&config);
        assert_eq!(drain(node.build(&builder)), vec![1, 2, 3]);
        assert_eq!(drain(node.build(&builder)), vec![1, 2, 3]);
    }

    #[test]
    fn test_fallible_source_wraps_errors() {
        let node = SourceNode::from_fallible(
            || vec![Ok(1), Err("bad record"), Ok(3)],
            "<closure>".to_string(),
        );
        let config = EngineConfig::default();
        let outcomes: Vec<_> = node.build(&ExecutionBuilder::new(&config)).collect();
        assert_eq!(outcomes.len(), 3);
        assert!(matches!(outcomes[1], Err(StreamError::Upstream(_))));
    }

    #[test]
    fn test_source_descriptor() {
        let node = SourceNode::from_factory(|| 0..3, "range".to_string());
        let descriptor = node.descriptor();
        assert_eq!(descriptor.kind, StageKind::Source);
        assert_eq!(descriptor.to_string(), "source(range)");
        assert!(node.upstream().is_none());
    }
}
