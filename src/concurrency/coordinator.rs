//! Sliding-window coordinator for concurrent map stages.

use super::pool::{PoolSettings, WorkerPool};
use super::Order;
use crate::error::Result;
use crate::pipeline::id::Position;
use crate::pipeline::node::Runnable;
use std::sync::Arc;

/// Turns an upstream element into a job for the pool.
pub type JobFactory<T, J> = Arc<dyn Fn(T) -> J + Send + Sync>;

/// Runnable of a concurrent map stage.
///
/// Each pull tops the window up to `workers` outcomes, then waits for the
/// oldest one (or, unordered, the first one to finish). At most `workers`
/// upstream elements are ever pulled ahead of emission.
pub struct ConcurrentMap<T, P: WorkerPool> {
    upstream: Option<Runnable<T>>,
    pool: Option<P>,
    job: JobFactory<T, P::Job>,
    settings: PoolSettings,
    order: Order,
    next_position: Position,
}

impl<T, P: WorkerPool> ConcurrentMap<T, P> {
    pub fn new(
        upstream: Runnable<T>,
        job: JobFactory<T, P::Job>,
        settings: PoolSettings,
        order: Order,
    ) -> Self {
        Self {
            upstream: Some(upstream),
            pool: None,
            job,
            settings,
            order,
            next_position: Position::FIRST,
        }
    }

    /// Top the window up to `workers` outcomes.
    fn fill(&mut self) -> Result<()> {
        let Some(pool) = self.pool.as_mut() else {
            return Ok(());
        };
        while pool.in_flight() < self.settings.workers {
            let Some(source) = self.upstream.as_mut() else {
                break;
            };
            match source.next() {
                Some(Ok(value)) => {
                    let position = self.next_position.advance();
                    pool.submit(position, (self.job)(value))?;
                }
                Some(Err(err)) => pool.submit_ready(self.next_position.advance(), Err(err)),
                None => self.upstream = None,
            }
        }
        Ok(())
    }

    /// Release the pool and the upstream chain.
    fn shutdown(&mut self) {
        self.pool = None;
        self.upstream = None;
    }
}

impl<T, P: WorkerPool> Iterator for ConcurrentMap<T, P> {
    type Item = Result<P::Output>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pool.is_none() {
            self.upstream.as_ref()?;
            match P::start(&self.settings) {
                Ok(pool) => self.pool = Some(pool),
                Err(err) => {
                    self.shutdown();
                    return Some(Err(err));
                }
            }
        }

        if let Err(err) = self.fill() {
            self.shutdown();
            return Some(Err(err));
        }

        let pool = self.pool.as_mut()?;
        let awaited = match self.order {
            Order::Ordered => pool.await_oldest(),
            Order::Unordered => pool.await_first(),
        };

        match awaited {
            Some((_, outcome)) => Some(outcome),
            None => {
                self.shutdown();
                None
            }
        }
    }
}
