//! # streamable-rs: lazy, composable stream pipelines
//!
//! A [`Stream`] is a declarative chain of stages (map, filter, flatten, group,
//! throttle, catch, observe, truncate, ...) that does nothing until it is
//! iterated. Map and flatten stages can run their work on a pool of OS
//! threads or as cooperative tasks while still emitting results in upstream
//! order.
//!
//! ## Architecture
//!
//! - **Pipeline**: descriptor nodes, the execution builder and the consumer iterator
//! - **Concurrency**: the ordered coordinator and its two worker pools
//! - **Config**: engine defaults loaded from JSON or TOML
//! - **Error**: one error type for declaration and iteration failures
//!
//! ## Configuration
//!
//! Engine defaults can be stored in the platform-appropriate config directory
//! under `streamable-rs`:
//!
//! - **Linux**: `~/.config/streamable-rs/engine.json`
//! - **macOS**: `~/Library/Application Support/streamable-rs/engine.json`
//! - **Windows**: `%APPDATA%\streamable-rs\engine.json`
//!
//! ## Example
//!
//! ```no_run
//! use streamable_rs::{CatchSpec, Stream};
//!
//! fn main() -> streamable_rs::Result<()> {
//!     let stream = Stream::new(vec![1, 2, 0, 3])
//!         .try_par_map(2, |x: i32| {
//!             if x == 0 {
//!                 Err("division by zero")
//!             } else {
//!                 Ok(10.0 / x as f64)
//!             }
//!         })?
//!         .catch_with(CatchSpec::any())
//!         .group_by_size(2)?;
//!
//!     for batch in &stream {
//!         println!("{:?}", batch?);
//!     }
//!     Ok(())
//! }
//! ```

pub mod concurrency;
pub mod config;
pub mod error;
pub mod pipeline;

// Re-export commonly used types
pub use concurrency::{Concurrency, Order};
pub use config::EngineConfig;
pub use error::{BoxError, Result, ResultExt, StreamError};
pub use pipeline::{
    Cadence, CatchSpec, ExecutionPlan, Grouping, ProgressReport, ProgressReporter,
    StageDescriptor, StageKind, Stream, StreamIter, Throttle, TracingReporter,
};
