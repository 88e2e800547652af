//! `Stream<T>` — the user-facing, lazily evaluated pipeline.
//!
//! Every operation returns a new stream wrapping the previous one; nothing
//! runs until the stream is iterated. Streams are cheap to clone and can be
//! iterated any number of times, each iteration being an independent session.

use super::compiled_plan::ExecutionPlan;
use super::compiler::{ExecutionBuilder, PipelineCompiler};
use super::executor::StreamIter;
use super::node::{callable_name, Describe, Stage, StageDescriptor};
use super::nodes::map::{AsyncMapFn, Execution, MapFn};
use super::nodes::{
    AsyncMapNode, CatchNode, CatchSpec, ChainNode, DistinctNode, FilterNode, FlattenNode,
    GroupNode, Grouping, KeyedGroupNode, Limit, MapNode, ObserveNode, SkipNode, SourceNode, Throttle,
    ThrottleNode, TruncateNode,
};
use super::report::{Cadence, ProgressReporter, TracingReporter};
use crate::concurrency::tasks::BoxFuture;
use crate::concurrency::Concurrency;
use crate::config::EngineConfig;
use crate::error::{BoxError, Result, StreamError};
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

/// Lazy, re-iterable stream of `T`.
pub struct Stream<T> {
    node: Arc<dyn Stage<T>>,
    config: Arc<EngineConfig>,
}

impl<T> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
            config: self.config.clone(),
        }
    }
}

impl<T: Send + 'static> Stream<T> {
    /// Stream over `iterable`, cloned at the start of every iteration.
    pub fn new<I>(iterable: I) -> Self
    where
        I: IntoIterator<Item = T> + Clone + Send + Sync + 'static,
        I::IntoIter: Send + 'static,
    {
        Self::root(SourceNode::from_iterable(iterable, callable_name::<I>()))
    }

    /// Stream over the iterable returned by `factory`, called once per iteration.
    pub fn from_fn<F, I>(factory: F) -> Self
    where
        F: Fn() -> I + Send + Sync + 'static,
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        Self::root(SourceNode::from_factory(factory, callable_name::<F>()))
    }

    /// Like [`Stream::from_fn`], for sources that can fail per element.
    pub fn try_from_fn<F, I, E>(factory: F) -> Self
    where
        F: Fn() -> I + Send + Sync + 'static,
        I: IntoIterator<Item = std::result::Result<T, E>>,
        I::IntoIter: Send + 'static,
        E: Into<BoxError>,
    {
        Self::root(SourceNode::from_fallible(factory, callable_name::<F>()))
    }

    fn root(node: impl Stage<T> + 'static) -> Self {
        Self {
            node: Arc::new(node),
            config: Arc::new(EngineConfig::default()),
        }
    }

    fn derive<U>(&self, node: impl Stage<U> + 'static) -> Stream<U> {
        Stream {
            node: Arc::new(node),
            config: self.config.clone(),
        }
    }

    pub(crate) fn node(&self) -> &Arc<dyn Stage<T>> {
        &self.node
    }

    /// Engine configuration used when this stream is iterated.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Same pipeline, iterated under `config`.
    pub fn with_config(&self, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            node: self.node.clone(),
            config: Arc::new(config),
        })
    }

    // ==================== Map ====================

    /// Apply `f` to each value.
    pub fn map<U, F>(&self, f: F) -> Stream<U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let label = callable_name::<F>();
        self.map_node(
            Arc::new(move |value: T| -> Result<U> { Ok(f(value)) }),
            Execution::Sequential,
            "map",
            label,
        )
    }

    /// Map with a fallible function; an error takes the element's place.
    pub fn try_map<U, E, F>(&self, f: F) -> Stream<U>
    where
        U: Send + 'static,
        E: Into<BoxError>,
        F: Fn(T) -> std::result::Result<U, E> + Send + Sync + 'static,
    {
        let label = callable_name::<F>();
        self.map_node(fallible(f), Execution::Sequential, "map", label)
    }

    /// Map on a pool of OS threads, preserving upstream order unless the
    /// concurrency asks for unordered emission.
    ///
    /// A panic in `f` becomes a [`StreamError::WorkerPanic`] at the element's
    /// position, whatever the worker count.
    pub fn par_map<U, F>(&self, concurrency: impl Into<Concurrency>, f: F) -> Result<Stream<U>>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let concurrency = concurrency.into();
        concurrency.validate()?;
        let label = callable_name::<F>();
        Ok(self.map_node(
            Arc::new(move |value: T| -> Result<U> { Ok(f(value)) }),
            Execution::Threads(concurrency),
            "par_map",
            label,
        ))
    }

    /// Fallible [`Stream::par_map`].
    pub fn try_par_map<U, E, F>(
        &self,
        concurrency: impl Into<Concurrency>,
        f: F,
    ) -> Result<Stream<U>>
    where
        U: Send + 'static,
        E: Into<BoxError>,
        F: Fn(T) -> std::result::Result<U, E> + Send + Sync + 'static,
    {
        let concurrency = concurrency.into();
        concurrency.validate()?;
        let label = callable_name::<F>();
        Ok(self.map_node(fallible(f), Execution::Threads(concurrency), "par_map", label))
    }

    /// Map with an async function, run as cooperative tasks on one carrier thread.
    ///
    /// Iterating such a stream from inside a tokio runtime panics.
    pub fn map_async<U, F, Fut>(&self, concurrency: impl Into<Concurrency>, f: F) -> Result<Stream<U>>
    where
        U: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = U> + Send + 'static,
    {
        let label = callable_name::<F>();
        let job: AsyncMapFn<T, U> = Arc::new(move |value: T| -> BoxFuture<U> {
            let fut = f(value);
            Box::pin(async move { Ok(fut.await) })
        });
        self.async_map_node(concurrency.into(), job, "map_async", label)
    }

    /// Fallible [`Stream::map_async`].
    pub fn try_map_async<U, E, F, Fut>(
        &self,
        concurrency: impl Into<Concurrency>,
        f: F,
    ) -> Result<Stream<U>>
    where
        U: Send + 'static,
        E: Into<BoxError>,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<U, E>> + Send + 'static,
    {
        let label = callable_name::<F>();
        let job: AsyncMapFn<T, U> = Arc::new(move |value: T| -> BoxFuture<U> {
            let fut = f(value);
            Box::pin(async move { fut.await.map_err(StreamError::upstream) })
        });
        self.async_map_node(concurrency.into(), job, "map_async", label)
    }

    fn map_node<U: Send + 'static>(
        &self,
        f: MapFn<T, U>,
        execution: Execution,
        name: &'static str,
        label: String,
    ) -> Stream<U> {
        self.derive(MapNode::new(self.clone(), f, execution, name, label))
    }

    fn async_map_node<U: Send + 'static>(
        &self,
        concurrency: Concurrency,
        job: AsyncMapFn<T, U>,
        name: &'static str,
        label: String,
    ) -> Result<Stream<U>> {
        concurrency.validate()?;
        Ok(self.derive(AsyncMapNode::new(
            self.clone(),
            job,
            concurrency,
            name,
            label,
        )))
    }

    // ==================== Foreach ====================

    /// Run `effect` on each value, then pass the value on.
    pub fn foreach<F>(&self, effect: F) -> Stream<T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let label = callable_name::<F>();
        self.map_node(
            Arc::new(move |value: T| -> Result<T> {
                effect(&value);
                Ok(value)
            }),
            Execution::Sequential,
            "foreach",
            label,
        )
    }

    /// Run a fallible `effect`; an error takes the value's place.
    pub fn try_foreach<E, F>(&self, effect: F) -> Stream<T>
    where
        E: Into<BoxError>,
        F: Fn(&T) -> std::result::Result<(), E> + Send + Sync + 'static,
    {
        let label = callable_name::<F>();
        self.map_node(
            Arc::new(move |value: T| -> Result<T> {
                effect(&value).map_err(StreamError::upstream)?;
                Ok(value)
            }),
            Execution::Sequential,
            "foreach",
            label,
        )
    }

    /// [`Stream::foreach`] on a pool of OS threads.
    pub fn par_foreach<F>(&self, concurrency: impl Into<Concurrency>, effect: F) -> Result<Stream<T>>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let concurrency = concurrency.into();
        concurrency.validate()?;
        let label = callable_name::<F>();
        Ok(self.map_node(
            Arc::new(move |value: T| -> Result<T> {
                effect(&value);
                Ok(value)
            }),
            Execution::Threads(concurrency),
            "par_foreach",
            label,
        ))
    }

    /// Fallible [`Stream::par_foreach`].
    pub fn try_par_foreach<E, F>(
        &self,
        concurrency: impl Into<Concurrency>,
        effect: F,
    ) -> Result<Stream<T>>
    where
        E: Into<BoxError>,
        F: Fn(&T) -> std::result::Result<(), E> + Send + Sync + 'static,
    {
        let concurrency = concurrency.into();
        concurrency.validate()?;
        let label = callable_name::<F>();
        Ok(self.map_node(
            Arc::new(move |value: T| -> Result<T> {
                effect(&value).map_err(StreamError::upstream)?;
                Ok(value)
            }),
            Execution::Threads(concurrency),
            "par_foreach",
            label,
        ))
    }

    /// Await `effect` on each value as cooperative tasks, then pass the value on.
    pub fn foreach_async<F, Fut>(&self, concurrency: impl Into<Concurrency>, effect: F) -> Result<Stream<T>>
    where
        F: Fn(&T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let label = callable_name::<F>();
        let job: AsyncMapFn<T, T> = Arc::new(move |value: T| -> BoxFuture<T> {
            let fut = effect(&value);
            Box::pin(async move {
                fut.await;
                Ok(value)
            })
        });
        self.async_map_node(concurrency.into(), job, "foreach_async", label)
    }

    /// Fallible [`Stream::foreach_async`].
    pub fn try_foreach_async<E, F, Fut>(
        &self,
        concurrency: impl Into<Concurrency>,
        effect: F,
    ) -> Result<Stream<T>>
    where
        E: Into<BoxError>,
        F: Fn(&T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), E>> + Send + 'static,
    {
        let label = callable_name::<F>();
        let job: AsyncMapFn<T, T> = Arc::new(move |value: T| -> BoxFuture<T> {
            let fut = effect(&value);
            Box::pin(async move {
                fut.await.map_err(StreamError::upstream)?;
                Ok(value)
            })
        });
        self.async_map_node(concurrency.into(), job, "foreach_async", label)
    }

    // ==================== Selection ====================

    /// Keep the values matching `predicate`.
    pub fn filter<F>(&self, predicate: F) -> Stream<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let label = callable_name::<F>();
        self.derive(FilterNode::new(self.clone(), Arc::new(predicate), label))
    }

    /// End the stream after `count` values.
    pub fn truncate(&self, count: usize) -> Stream<T> {
        self.derive(TruncateNode::new(self.clone(), Limit::Count(count)))
    }

    /// End the stream at the first value matching `stop_when`, which is not emitted.
    pub fn truncate_when<F>(&self, stop_when: F) -> Stream<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let label = callable_name::<F>();
        self.derive(TruncateNode::new(
            self.clone(),
            Limit::When(Arc::new(stop_when), label),
        ))
    }

    /// Drop the first `count` values.
    pub fn skip(&self, count: usize) -> Stream<T> {
        self.derive(SkipNode::new(self.clone(), count))
    }

    /// Keep the first occurrence of each value.
    pub fn distinct(&self) -> Stream<T>
    where
        T: Clone + Hash + Eq,
    {
        self.derive(DistinctNode::new(
            self.clone(),
            Arc::new(|value: &T| value.clone()),
            false,
            "value".to_string(),
        ))
    }

    /// Keep the first value of each key, or of each run of equal keys when
    /// `consecutive_only` is set.
    pub fn distinct_by<K, F>(&self, key: F, consecutive_only: bool) -> Stream<T>
    where
        K: Hash + Eq + Send + 'static,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        let label = callable_name::<F>();
        self.derive(DistinctNode::new(
            self.clone(),
            Arc::new(key),
            consecutive_only,
            label,
        ))
    }

    // ==================== Grouping ====================

    /// Batch values under the combined triggers of `grouping`.
    pub fn group<K>(&self, grouping: Grouping<T, K>) -> Result<Stream<Vec<T>>>
    where
        K: PartialEq + Send + 'static,
    {
        grouping.validate()?;
        Ok(self.derive(GroupNode::new(self.clone(), grouping)))
    }

    /// Batches of `size` values; the last one may be shorter.
    pub fn group_by_size(&self, size: usize) -> Result<Stream<Vec<T>>> {
        self.group(Grouping::new().size(size))
    }

    /// Batches of whatever arrived within each `interval`.
    pub fn group_by_interval(&self, interval: Duration) -> Result<Stream<Vec<T>>> {
        self.group(Grouping::new().interval(interval))
    }

    /// Batch consecutive runs of values sharing a key.
    pub fn group_by_key<K, F>(&self, key: F) -> Stream<Vec<T>>
    where
        K: PartialEq + Send + 'static,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        self.derive(GroupNode::new(self.clone(), Grouping::new().by(key)))
    }

    /// Batch consecutive runs sharing a key, yielding each batch with its key.
    ///
    /// Size and interval triggers of `grouping` also apply; a run cut by one of
    /// them continues in a new batch with the same key.
    pub fn group_by<K, F>(&self, key: F, grouping: Grouping<T>) -> Result<Stream<(K, Vec<T>)>>
    where
        K: PartialEq + Send + 'static,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        grouping.validate()?;
        Ok(self.derive(KeyedGroupNode::new(self.clone(), key, grouping)))
    }

    // ==================== Throttling ====================

    /// Delay pulls so that every constraint of `throttle` holds.
    pub fn throttle(&self, throttle: Throttle) -> Result<Stream<T>> {
        throttle.validate()?;
        Ok(self.derive(ThrottleNode::new(self.clone(), throttle)))
    }

    /// At most `per_second` values in any one-second window.
    pub fn throttle_per_second(&self, per_second: u32) -> Result<Stream<T>> {
        self.throttle(Throttle::per_second(per_second))
    }

    /// At least `interval` between two values.
    pub fn throttle_interval(&self, interval: Duration) -> Result<Stream<T>> {
        self.throttle(Throttle::interval(interval))
    }

    // ==================== Errors ====================

    /// Suppress errors whose underlying type is `E`.
    pub fn catch<E>(&self) -> Stream<T>
    where
        E: std::error::Error + 'static,
    {
        self.catch_with(CatchSpec::kind::<E>())
    }

    /// Catch errors as described by `spec`.
    pub fn catch_with(&self, spec: CatchSpec<T>) -> Stream<T> {
        self.derive(CatchNode::new(self.clone(), spec))
    }

    // ==================== Observation ====================

    /// Log progress through `tracing` at the configured cadence.
    pub fn observe(&self, label: impl Into<String>) -> Stream<T> {
        self.derive(ObserveNode::new(
            self.clone(),
            label.into(),
            None,
            Arc::new(TracingReporter),
        ))
    }

    /// Send progress reports to `reporter` every `cadence`.
    pub fn observe_with(
        &self,
        label: impl Into<String>,
        cadence: Cadence,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Result<Stream<T>> {
        cadence.validate()?;
        Ok(self.derive(ObserveNode::new(
            self.clone(),
            label.into(),
            Some(cadence),
            reporter,
        )))
    }

    // ==================== Composition ====================

    /// This stream followed by `other`.
    pub fn chain(&self, other: &Stream<T>) -> Stream<T> {
        self.derive(ChainNode::new(self.clone(), other.clone()))
    }

    // ==================== Consumption ====================

    /// Start a new iteration session.
    pub fn iter(&self) -> StreamIter<T> {
        let depth = std::iter::successors(Some(self as &dyn Describe), |node| node.upstream()).count();
        let chain = ExecutionBuilder::new(&self.config).build(self);
        StreamIter::new(chain, depth)
    }

    /// Drain the stream, returning the number of values or the first error.
    pub fn count(&self) -> Result<usize> {
        let mut count = 0;
        for outcome in self.iter() {
            outcome?;
            count += 1;
        }
        Ok(count)
    }

    /// Descriptors of this stream's stages, source first.
    pub fn plan(&self) -> ExecutionPlan {
        PipelineCompiler::compile(self)
    }

    /// Text rendering of the stage chain, terminal stage first.
    pub fn explain(&self) -> String {
        super::explain::explain(self)
    }
}

impl<I> Stream<I>
where
    I: IntoIterator + Send + 'static,
    I::IntoIter: Send + 'static,
    I::Item: Send + 'static,
{
    /// Yield the elements of each upstream sequence in turn.
    pub fn flatten(&self) -> Stream<I::Item> {
        self.derive(FlattenNode::new(self.clone(), None))
    }

    /// Drain up to `concurrency` upstream sequences at once.
    pub fn par_flatten(&self, concurrency: impl Into<Concurrency>) -> Result<Stream<I::Item>> {
        let concurrency = concurrency.into();
        concurrency.validate()?;
        Ok(self.derive(FlattenNode::new(self.clone(), Some(concurrency))))
    }
}

fn fallible<T, U, E, F>(f: F) -> MapFn<T, U>
where
    E: Into<BoxError>,
    F: Fn(T) -> std::result::Result<U, E> + Send + Sync + 'static,
{
    Arc::new(move |value: T| f(value).map_err(StreamError::upstream))
}

impl<T: Send + 'static> Describe for Stream<T> {
    fn descriptor(&self) -> StageDescriptor {
        self.node.descriptor()
    }

    fn upstream(&self) -> Option<&dyn Describe> {
        self.node.upstream()
    }
}

impl<'a, T: Send + 'static> IntoIterator for &'a Stream<T> {
    type Item = Result<T>;
    type IntoIter = StreamIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: Send + 'static> fmt::Display for Stream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.explain())
    }
}

impl<T: Send + 'static> fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("stage", &self.node.descriptor())
            .finish_non_exhaustive()
    }
}
