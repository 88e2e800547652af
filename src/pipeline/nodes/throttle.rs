//! ThrottleNode — rate limiting stage.
//!
//! Each rolling window keeps the instants of its last `limit` admissions.
//! Before pulling upstream the stage computes the earliest instant allowed
//! by every window and by the minimum interval, and sleeps until then.
//! Elements are delayed, never dropped or reordered.

use crate::error::{Result, StreamError};
use crate::pipeline::compiler::ExecutionBuilder;
use crate::pipeline::kind::StageKind;
use crate::pipeline::node::{Describe, Runnable, Stage, StageDescriptor};
use crate::pipeline::stream::Stream;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

const SECOND: Duration = Duration::from_secs(1);
const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

/// Rate limits of a throttle stage. Unset limits do not apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Throttle {
    pub per_second: Option<u32>,
    pub per_minute: Option<u32>,
    pub per_hour: Option<u32>,
    /// Minimum time between two admissions
    pub interval: Option<Duration>,
}

impl Throttle {
    pub fn per_second(per_second: u32) -> Self {
        Self {
            per_second: Some(per_second),
            ..Self::default()
        }
    }

    pub fn interval(interval: Duration) -> Self {
        Self {
            interval: Some(interval),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, limit) in [
            ("per_second", self.per_second),
            ("per_minute", self.per_minute),
            ("per_hour", self.per_hour),
        ] {
            if limit == Some(0) {
                return Err(StreamError::Configuration(format!(
                    "throttle {} must be at least 1",
                    name
                )));
            }
        }
        if self.interval.is_some_and(|i| i.is_zero()) {
            return Err(StreamError::Timing(
                "throttle interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    fn windows(&self) -> Vec<Window> {
        [
            (self.per_second, SECOND),
            (self.per_minute, MINUTE),
            (self.per_hour, HOUR),
        ]
        .into_iter()
        .filter_map(|(limit, span)| limit.map(|l| Window::new(l as usize, span)))
        .collect()
    }
}

/// Rolling window admitting `limit` pulls per `span`.
struct Window {
    limit: usize,
    span: Duration,
    admissions: VecDeque<Instant>,
}

impl Window {
    fn new(limit: usize, span: Duration) -> Self {
        Self {
            limit,
            span,
            admissions: VecDeque::with_capacity(limit),
        }
    }

    fn earliest(&self) -> Option<Instant> {
        if self.admissions.len() < self.limit {
            return None;
        }
        self.admissions.front().map(|first| *first + self.span)
    }

    fn admit(&mut self, at: Instant) {
        if self.admissions.len() == self.limit {
            self.admissions.pop_front();
        }
        self.admissions.push_back(at);
    }
}

/// Throttle node.
pub struct ThrottleNode<T> {
    upstream: Stream<T>,
    throttle: Throttle,
}

impl<T> ThrottleNode<T> {
    pub fn new(upstream: Stream<T>, throttle: Throttle) -> Self {
        Self { upstream, throttle }
    }
}

impl<T: Send + 'static> Describe for ThrottleNode<T> {
    fn descriptor(&self) -> StageDescriptor {
        let mut descriptor = StageDescriptor::new(StageKind::Throttle, "throttle");
        for (name, limit) in [
            ("per_second", self.throttle.per_second),
            ("per_minute", self.throttle.per_minute),
            ("per_hour", self.throttle.per_hour),
        ] {
            if let Some(limit) = limit {
                descriptor = descriptor.param(name, limit);
            }
        }
        if let Some(interval) = self.throttle.interval {
            descriptor = descriptor.param("interval", format!("{:?}", interval));
        }
        descriptor
    }

    fn upstream(&self) -> Option<&dyn Describe> {
        Some(&self.upstream)
    }
}

impl<T: Send + 'static> Stage<T> for ThrottleNode<T> {
    fn build(&self, builder: &ExecutionBuilder<'_>) -> Runnable<T> {
        Box::new(ThrottleIter {
            upstream: Some(builder.build(&self.upstream)),
            windows: self.throttle.windows(),
            interval: self.throttle.interval,
            last: None,
        })
    }
}

struct ThrottleIter<T> {
    upstream: Option<Runnable<T>>,
    windows: Vec<Window>,
    interval: Option<Duration>,
    last: Option<Instant>,
}

impl<T> ThrottleIter<T> {
    fn earliest(&self) -> Option<Instant> {
        let from_interval = self.last.zip(self.interval).map(|(last, i)| last + i);
        self.windows
            .iter()
            .filter_map(Window::earliest)
            .chain(from_interval)
            .max()
    }

    fn wait(&self) {
        if let Some(earliest) = self.earliest() {
            let now = Instant::now();
            if earliest > now {
                let delay = earliest - now;
                tracing::trace!(delay_ms = delay.as_millis() as u64, "throttling");
                std::thread::sleep(delay);
            }
        }
    }
}

impl<T> Iterator for ThrottleIter<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.upstream.as_ref()?;
        self.wait();

        let admitted = Instant::now();
        for window in &mut self.windows {
            window.admit(admitted);
        }
        self.last = Some(admitted);

        let outcome = self.upstream.as_mut()?.next();
        if outcome.is_none() {
            self.upstream = None;
        }
        outcome
    }
}
