use crate::error::Result;
use crate::pipeline::compiler::ExecutionBuilder;
use crate::pipeline::kind::StageKind;
use crate::pipeline::node::{Describe, Runnable, Stage, StageDescriptor};
use crate::pipeline::stream::Stream;

/// Skip node — discards the first `count` values. Errors are not counted.
pub struct SkipNode<T> {
    upstream: Stream<T>,
    count: usize,
}

impl<T> SkipNode<T> {
    pub fn new(upstream: Stream<T>, count: usize) -> Self {
        Self { upstream, count }
    }
}

impl<T: Send + 'static> Describe for SkipNode<T> {
    fn descriptor(&self) -> StageDescriptor {
        StageDescriptor::new(StageKind::Skip, "skip").param("count", self.count)
    }

    fn upstream(&self) -> Option<&dyn Describe> {
        Some(&self.upstream)
    }
}

impl<T: Send + 'static> Stage<T> for SkipNode<T> {
    fn build(&self, builder: &ExecutionBuilder<'_>) -> Runnable<T> {
        Box::new(SkipIter {
            upstream: builder.build(&self.upstream),
            remaining: self.count,
        })
    }
}

struct SkipIter<T> {
    upstream: Runnable<T>,
    remaining: usize,
}

impl<T> Iterator for SkipIter<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.upstream.next()? {
                Ok(_) if self.remaining > 0 => self.remaining -= 1,
                outcome => return Some(outcome),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Stream;

    #[test]
    fn test_skip() {
        let out: Vec<i32> = Stream::new(1..=6)
            .skip(2)
            .iter()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(out, vec![3, 4, 5, 6]);
    }

    #[test]
    fn test_skip_does_not_count_errors() {
        let out: Vec<Option<i32>> = Stream::try_from_fn(|| vec![Err("e"), Ok(1), Ok(2), Ok(3)])
            .skip(1)
            .catch_with(crate::CatchSpec::any().replacement(-1))
            .iter()
            .map(|r| r.ok())
            .collect();
        assert_eq!(out, vec![Some(-1), Some(2), Some(3)]);
    }
}
