//! Concurrent flatten.
//!
//! Up to `workers` inner sequences are drained at once, each by one pool
//! thread into its own bounded lane. Ordered emission drains the lanes in
//! upstream order, so the output matches a sequential flatten; unordered
//! emission takes from whichever lane has an element ready.

use super::pool::{panic_error, PoolSettings};
use super::threads::ThreadPool;
use super::Order;
use crate::error::{Result, StreamError};
use crate::pipeline::node::Runnable;
use crossbeam_channel::{bounded, Receiver, Select};
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;

enum Lane<U> {
    /// Upstream error holding its place among the lanes
    Failed(StreamError),
    Draining(Receiver<Result<U>>),
}

/// Runnable of a concurrent flatten stage.
pub struct ConcurrentFlatten<I, U> {
    // Lanes go first so their receivers are gone before the pool joins.
    lanes: VecDeque<Lane<U>>,
    upstream: Option<Runnable<I>>,
    pool: Option<ThreadPool>,
    settings: PoolSettings,
    capacity: usize,
    order: Order,
}

impl<I, U> ConcurrentFlatten<I, U>
where
    I: IntoIterator<Item = U> + Send + 'static,
    U: Send + 'static,
{
    pub fn new(upstream: Runnable<I>, settings: PoolSettings, capacity: usize, order: Order) -> Self {
        Self {
            lanes: VecDeque::with_capacity(settings.workers),
            upstream: Some(upstream),
            pool: None,
            settings,
            capacity: capacity.max(1),
            order,
        }
    }

    /// Open lanes until `workers` are in flight or upstream ends.
    fn fill(&mut self) -> Result<()> {
        let Some(pool) = self.pool.as_ref() else {
            return Ok(());
        };
        while self.lanes.len() < self.settings.workers {
            let Some(source) = self.upstream.as_mut() else {
                break;
            };
            match source.next() {
                Some(Ok(inner)) => {
                    let (sender, receiver) = bounded(self.capacity);
                    let cancelled = pool.cancel_flag();
                    pool.execute(move || {
                        let drained = catch_unwind(AssertUnwindSafe(|| {
                            for item in inner {
                                if cancelled.load(Ordering::Acquire) || sender.send(Ok(item)).is_err() {
                                    return;
                                }
                            }
                        }));
                        if let Err(payload) = drained {
                            let _ = sender.send(Err(panic_error(payload)));
                        }
                    })?;
                    self.lanes.push_back(Lane::Draining(receiver));
                }
                Some(Err(err)) => self.lanes.push_back(Lane::Failed(err)),
                None => self.upstream = None,
            }
        }
        Ok(())
    }

    fn next_ordered(&mut self) -> Option<Result<U>> {
        loop {
            if let Err(err) = self.fill() {
                self.shutdown();
                return Some(Err(err));
            }
            match self.lanes.front()? {
                Lane::Failed(_) => {
                    if let Some(Lane::Failed(err)) = self.lanes.pop_front() {
                        return Some(Err(err));
                    }
                }
                Lane::Draining(receiver) => match receiver.recv() {
                    Ok(item) => return Some(item),
                    Err(_) => {
                        self.lanes.pop_front();
                    }
                },
            }
        }
    }

    fn next_unordered(&mut self) -> Option<Result<U>> {
        loop {
            if let Err(err) = self.fill() {
                self.shutdown();
                return Some(Err(err));
            }
            if self.lanes.is_empty() {
                return None;
            }
            if let Some(index) = self.lanes.iter().position(|l| matches!(l, Lane::Failed(_))) {
                if let Some(Lane::Failed(err)) = self.lanes.remove(index) {
                    return Some(Err(err));
                }
                continue;
            }

            let (index, received) = {
                let draining: Vec<(usize, &Receiver<Result<U>>)> = self
                    .lanes
                    .iter()
                    .enumerate()
                    .filter_map(|(i, lane)| match lane {
                        Lane::Draining(receiver) => Some((i, receiver)),
                        Lane::Failed(_) => None,
                    })
                    .collect();

                let mut select = Select::new();
                for (_, receiver) in &draining {
                    select.recv(receiver);
                }
                let operation = select.select();
                let (index, receiver) = draining[operation.index()];
                (index, operation.recv(receiver))
            };

            match received {
                Ok(item) => return Some(item),
                Err(_) => {
                    self.lanes.remove(index);
                }
            }
        }
    }

    fn shutdown(&mut self) {
        self.lanes.clear();
        self.pool = None;
        self.upstream = None;
    }
}

impl<I, U> Iterator for ConcurrentFlatten<I, U>
where
    I: IntoIterator<Item = U> + Send + 'static,
    U: Send + 'static,
{
    type Item = Result<U>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pool.is_none() {
            self.upstream.as_ref()?;
            match ThreadPool::new(&self.settings) {
                Ok(pool) => self.pool = Some(pool),
                Err(err) => {
                    self.shutdown();
                    return Some(Err(err));
                }
            }
        }

        let item = match self.order {
            Order::Ordered => self.next_ordered(),
            Order::Unordered => self.next_unordered(),
        };
        if item.is_none() {
            self.shutdown();
        }
        item
    }
}
