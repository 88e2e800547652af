//! Stage kind enumeration.
//!
//! Every descriptor node in a stream is tagged with one of these kinds. The
//! set is closed: new operations are expressed in terms of an existing kind
//! (for example `foreach` is a `Map` that hands back its input).

use serde::{Deserialize, Serialize};

/// Kinds of stages a stream can be made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageKind {
    // Root
    /// Wraps the external element source.
    Source,

    // Element-wise transforms
    /// Applies a function to each element sequentially.
    Map,
    /// Applies a function to each element across a worker pool.
    ConcurrentMap,
    /// Drains nested sequences one after the other.
    Flatten,
    /// Drains several nested sequences at once.
    ConcurrentFlatten,

    // Grouping
    /// Batches consecutive runs of equal keys.
    GroupByKey,
    /// Batches a fixed number of elements.
    GroupBySize,
    /// Batches whatever arrived within a time interval.
    GroupByInterval,

    // Selection
    Filter,
    Truncate,
    Skip,
    Distinct,

    // Flow control
    Catch,
    Throttle,
    Observe,
}

impl StageKind {
    /// Get the display name for this stage kind.
    pub fn display_name(&self) -> &'static str {
        match self {
            StageKind::Source => "Source",
            StageKind::Map => "Map",
            StageKind::ConcurrentMap => "Concurrent Map",
            StageKind::Flatten => "Flatten",
            StageKind::ConcurrentFlatten => "Concurrent Flatten",
            StageKind::GroupByKey => "Group By Key",
            StageKind::GroupBySize => "Group By Size",
            StageKind::GroupByInterval => "Group By Interval",
            StageKind::Filter => "Filter",
            StageKind::Truncate => "Truncate",
            StageKind::Skip => "Skip",
            StageKind::Distinct => "Distinct",
            StageKind::Catch => "Catch",
            StageKind::Throttle => "Throttle",
            StageKind::Observe => "Observe",
        }
    }

    /// Get all stage kinds.
    pub fn all() -> &'static [StageKind] {
        &[
            StageKind::Source,
            StageKind::Map,
            StageKind::ConcurrentMap,
            StageKind::Flatten,
            StageKind::ConcurrentFlatten,
            StageKind::GroupByKey,
            StageKind::GroupBySize,
            StageKind::GroupByInterval,
            StageKind::Filter,
            StageKind::Truncate,
            StageKind::Skip,
            StageKind::Distinct,
            StageKind::Catch,
            StageKind::Throttle,
            StageKind::Observe,
        ]
    }

    /// Check if stages of this kind run work on a pool.
    pub fn is_concurrent(&self) -> bool {
        matches!(self, StageKind::ConcurrentMap | StageKind::ConcurrentFlatten)
    }

    /// Check if stages of this kind hold elements back before emitting them.
    pub fn is_buffering(&self) -> bool {
        matches!(
            self,
            StageKind::GroupByKey | StageKind::GroupBySize | StageKind::GroupByInterval
        )
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
