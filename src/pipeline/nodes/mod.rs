//! Built-in stage node implementations.

pub mod catch;
pub mod distinct;
pub mod filter;
pub mod flatten;
pub mod group;
pub mod map;
pub mod observe;
pub mod skip;
pub mod source;
pub mod throttle;
pub mod truncate;

pub use catch::{CatchNode, CatchSpec};
pub use distinct::DistinctNode;
pub use filter::FilterNode;
pub use flatten::FlattenNode;
pub use group::{GroupNode, Grouping, KeyedGroupNode};
pub use map::{AsyncMapNode, Execution, MapNode};
pub use observe::ObserveNode;
pub use skip::SkipNode;
pub use source::{ChainNode, SourceNode};
pub use throttle::{Throttle, ThrottleNode};
pub use truncate::{Limit, TruncateNode};
