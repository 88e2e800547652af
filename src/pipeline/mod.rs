//! Lazy stream pipelines.
//!
//! A pipeline is declared as a chain of descriptor nodes, each wrapping the
//! one before it. Declaring does no work: iterating a [`Stream`] compiles the
//! chain into a fresh runnable iterator per stage, root first, and pulls
//! elements through it on demand.
//!
//! # Architecture
//!
//! ```text
//! Stream::new ──► map ──► filter ──► group ──► Stream::iter()
//!   (descriptor chain, immutable)                │
//!                                                ▼
//!                        ExecutionBuilder ──► Runnable chain ──► StreamIter
//! ```
//!
//! # Design
//!
//! - **Descriptors are shared** — nodes sit behind `Arc` and never change.
//! - **Runnables are per session** — every `iter()` builds its own chain.
//! - **Pull driven** — a stage only pulls its upstream when pulled itself.
//! - **Errors are outcomes** — they travel in position like values.

pub mod compiled_plan;
pub mod compiler;
pub mod executor;
pub mod explain;
pub mod id;
pub mod kind;
pub mod node;
pub mod nodes;
pub mod report;
pub mod stream;

pub use crate::concurrency::{Concurrency, Order};
pub use compiled_plan::{ExecutionPlan, PlanStats};
pub use compiler::{ExecutionBuilder, PipelineCompiler};
pub use executor::{SessionState, StreamIter};
pub use explain::explain;
pub use id::Position;
pub use kind::StageKind;
pub use node::{Describe, Runnable, Stage, StageDescriptor};
pub use nodes::{CatchSpec, Grouping, Throttle};
pub use report::{Cadence, ProgressReport, ProgressReporter, TracingReporter};
pub use stream::Stream;
