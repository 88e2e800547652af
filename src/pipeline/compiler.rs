use super::compiled_plan::{ExecutionPlan, PlanStats};
use super::node::{Describe, Runnable, StageDescriptor};
use super::stream::Stream;
use crate::config::EngineConfig;

/// Compiles a descriptor chain into an execution plan
pub struct PipelineCompiler;

impl PipelineCompiler {
    /// Compile a descriptor chain into an execution plan.
    ///
    /// Walks from the terminal node to the root without recursion, then
    /// reverses so the plan lists stages in the order they are built.
    ///
    /// # Arguments
    /// * `terminal` - The last node of the chain
    ///
    /// # Returns
    /// An `ExecutionPlan` with one descriptor per node, root first
    pub fn compile(terminal: &dyn Describe) -> ExecutionPlan {
        let start_time = std::time::Instant::now();

        let mut stages = Self::collect(terminal);
        stages.reverse();

        let stats = Self::stats(&stages, start_time.elapsed().as_micros() as u64);

        ExecutionPlan { stages, stats }
    }

    /// Collect descriptors from terminal to root
    fn collect(terminal: &dyn Describe) -> Vec<StageDescriptor> {
        let mut stages = Vec::new();
        let mut cursor = Some(terminal);

        while let Some(node) = cursor {
            stages.push(node.descriptor());
            cursor = node.upstream();
        }

        stages
    }

    fn stats(stages: &[StageDescriptor], compile_time_us: u64) -> PlanStats {
        let concurrent: Vec<&StageDescriptor> =
            stages.iter().filter(|s| s.kind.is_concurrent()).collect();

        PlanStats {
            depth: stages.len(),
            concurrent_stages: concurrent.len(),
            total_workers: concurrent.iter().filter_map(|s| s.workers).sum(),
            buffering_stages: stages.iter().filter(|s| s.kind.is_buffering()).count(),
            compile_time_us,
        }
    }
}

/// Builds the runnable chain of one iteration session.
///
/// Every call to [`Stream::iter`] creates a fresh builder, so no state is
/// shared between sessions over the same stream.
pub struct ExecutionBuilder<'a> {
    config: &'a EngineConfig,
}

impl<'a> ExecutionBuilder<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Configuration stages resolve their defaults from.
    pub fn config(&self) -> &EngineConfig {
        self.config
    }

    /// Build the runnable for `stream`, its source first.
    pub fn build<T: Send + 'static>(&self, stream: &Stream<T>) -> Runnable<T> {
        stream.node().build(self)
    }
}
