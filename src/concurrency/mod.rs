//! Bounded-parallelism execution for map and flatten stages.
//!
//! A concurrent stage keeps a sliding window of at most `workers` in-flight
//! tasks, each tagged with the [`Position`](crate::pipeline::Position) of the
//! upstream outcome it came from. Emission waits on the oldest position, so
//! the output order is the sequential order no matter which task finishes
//! first.
//!
//! # Architecture
//!
//! ```text
//! upstream ──► [ConcurrentMap] ──submit──► WorkerPool ──► ThreadWorkers (OS threads)
//!                    ▲                          │     └─► TaskWorkers   (tokio current-thread)
//!                    └──── await_oldest ◄───────┘
//! ```
//!
//! # Design
//!
//! - **One coordinator** — `ConcurrentMap` is written once against `WorkerPool`.
//! - **Lazy pools** — threads or runtimes are started on the first pull.
//! - **Drop is teardown** — pools cancel queued work and join or abort on drop.

pub mod coordinator;
pub mod flatten;
pub mod pool;
pub mod tasks;
pub mod threads;

pub use coordinator::ConcurrentMap;
pub use flatten::ConcurrentFlatten;
pub use pool::{PoolSettings, WorkerPool};
pub use tasks::TaskWorkers;
pub use threads::{ThreadPool, ThreadWorkers};

use crate::config::EngineConfig;
use crate::error::{Result, StreamError};
use serde::{Deserialize, Serialize};

/// Emission order of a concurrent stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Order {
    /// Emit in upstream order.
    Ordered,
    /// Emit whichever task finishes first.
    Unordered,
}

impl std::fmt::Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Order::Ordered => write!(f, "ordered"),
            Order::Unordered => write!(f, "unordered"),
        }
    }
}

/// Worker count and emission order of a concurrent stage.
///
/// Plain numbers convert into a `Concurrency` whose order falls back to
/// `concurrency.ordered` of the stream's [`EngineConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Concurrency {
    workers: usize,
    order: Option<Order>,
}

impl Concurrency {
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            order: None,
        }
    }

    pub fn ordered(mut self) -> Self {
        self.order = Some(Order::Ordered);
        self
    }

    pub fn unordered(mut self) -> Self {
        self.order = Some(Order::Unordered);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Explicit order, if one was requested.
    pub fn order(&self) -> Option<Order> {
        self.order
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(StreamError::Configuration(
                "concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Order to run with under `config`.
    pub fn resolve_order(&self, config: &EngineConfig) -> Order {
        self.order.unwrap_or(if config.concurrency.ordered {
            Order::Ordered
        } else {
            Order::Unordered
        })
    }

    /// Pool settings for this stage under `config`.
    pub fn settings(&self, config: &EngineConfig) -> PoolSettings {
        PoolSettings {
            workers: self.workers,
            thread_name_prefix: config.concurrency.thread_name_prefix.clone(),
        }
    }
}

impl From<usize> for Concurrency {
    fn from(workers: usize) -> Self {
        Self::new(workers)
    }
}
