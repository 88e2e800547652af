use super::node::StageDescriptor;
use serde::Serialize;

/// Compiled description of a stream's stage chain.
/// Contains one descriptor per node, root (source) first.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionPlan {
    /// Stage descriptors in build order
    pub stages: Vec<StageDescriptor>,

    /// Compilation statistics
    pub stats: PlanStats,
}

/// Statistics about the compiled plan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlanStats {
    /// Number of stages including the source
    pub depth: usize,

    /// Number of stages running work on a pool
    pub concurrent_stages: usize,

    /// Sum of worker counts over concurrent stages
    pub total_workers: usize,

    /// Number of stages that hold elements back (grouping)
    pub buffering_stages: usize,

    /// Compilation time in microseconds
    pub compile_time_us: u64,
}

impl ExecutionPlan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            stats: PlanStats::default(),
        }
    }

    /// Check if the plan has any stages
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// The root stage
    pub fn source(&self) -> Option<&StageDescriptor> {
        self.stages.first()
    }
}

impl Default for ExecutionPlan {
    fn default() -> Self {
        Self::new()
    }
}
