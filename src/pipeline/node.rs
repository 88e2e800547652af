//! Node abstraction for the descriptor graph.
//!
//! Two-layer design:
//! - **`Describe` trait** — untyped view of a node (its descriptor and its
//!   upstream), so the compiler and `explain` can walk a chain whose element
//!   type changes from stage to stage.
//! - **`Stage<T>` trait** — typed view that knows how to build the runnable
//!   iterator producing `T`, given the builder for the current session.
//!
//! Nodes are immutable once created and shared through `Arc`; the runnable
//! they build is owned by exactly one iteration session.

use crate::error::Result;
use crate::pipeline::compiler::ExecutionBuilder;
use crate::pipeline::kind::StageKind;
use serde::Serialize;
use std::fmt;

/// Runnable iterator: `Some(Ok)` is a value, `Some(Err)` an error, `None` the end.
pub type Runnable<T> = Box<dyn Iterator<Item = Result<T>> + Send>;

/// Untyped view of a descriptor node.
pub trait Describe: Send + Sync {
    /// Kind and parameters of this node.
    fn descriptor(&self) -> StageDescriptor;

    /// The node this one wraps, `None` for the root.
    fn upstream(&self) -> Option<&dyn Describe>;
}

/// Typed descriptor node producing elements of type `T`.
pub trait Stage<T>: Describe {
    /// Build the runnable for this node, building its upstream first.
    fn build(&self, builder: &ExecutionBuilder<'_>) -> Runnable<T>;
}

/// Serializable description of one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageDescriptor {
    pub kind: StageKind,
    /// Operation name as declared (`map`, `foreach`, `par_map`, ...)
    pub name: &'static str,
    /// Name of the callable or source, when one is known
    pub label: Option<String>,
    /// Worker count of concurrent stages
    pub workers: Option<usize>,
    pub params: Vec<(String, String)>,
}

impl StageDescriptor {
    pub fn new(kind: StageKind, name: &'static str) -> Self {
        Self {
            kind,
            name,
            label: None,
            workers: None,
            params: Vec::new(),
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }
}

impl fmt::Display for StageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        let mut first = true;
        let mut sep = |f: &mut fmt::Formatter<'_>| -> fmt::Result {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            Ok(())
        };
        if let Some(label) = &self.label {
            sep(f)?;
            write!(f, "{}", label)?;
        }
        if let Some(workers) = self.workers {
            sep(f)?;
            write!(f, "concurrency={}", workers)?;
        }
        for (key, value) in &self.params {
            sep(f)?;
            write!(f, "{}={}", key, value)?;
        }
        write!(f, ")")
    }
}

/// Short display name of a callable or source type.
///
/// Closures render as `<closure>`, functions and types as their last path
/// segment without generic arguments.
pub fn callable_name<F: ?Sized>() -> String {
    let full = std::any::type_name::<F>();
    if full.contains("{{closure}}") {
        return "<closure>".to_string();
    }
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn double(x: i32) -> i32 {
        x * 2
    }

    fn name_of<F>(_: &F) -> String {
        callable_name::<F>()
    }

    #[test]
    fn test_callable_name() {
        assert_eq!(name_of(&double), "double");
        assert_eq!(name_of(&|x: i32| x + 1), "<closure>");
        assert_eq!(callable_name::<Vec<i32>>(), "Vec");
    }

    #[test]
    fn test_descriptor_display() {
        let descriptor = StageDescriptor::new(StageKind::ConcurrentMap, "par_map")
            .label("double")
            .workers(4)
            .param("order", "ordered");
        assert_eq!(
            descriptor.to_string(),
            "par_map(double, concurrency=4, order=ordered)"
        );
        assert_eq!(
            StageDescriptor::new(StageKind::Flatten, "flatten").to_string(),
            "flatten()"
        );
    }
}
