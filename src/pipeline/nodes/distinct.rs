use crate::error::Result;
use crate::pipeline::compiler::ExecutionBuilder;
use crate::pipeline::kind::StageKind;
use crate::pipeline::node::{Describe, Runnable, Stage, StageDescriptor};
use crate::pipeline::stream::Stream;
use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

pub type KeyFn<T, K> = Arc<dyn Fn(&T) -> K + Send + Sync>;

/// Distinct node — drops values whose key was already seen.
///
/// The global mode remembers every key of the session; the consecutive mode
/// only compares with the previous value's key.
pub struct DistinctNode<T, K> {
    upstream: Stream<T>,
    key: KeyFn<T, K>,
    consecutive_only: bool,
    label: String,
}

impl<T, K> DistinctNode<T, K> {
    pub fn new(upstream: Stream<T>, key: KeyFn<T, K>, consecutive_only: bool, label: String) -> Self {
        Self {
            upstream,
            key,
            consecutive_only,
            label,
        }
    }
}

impl<T, K> Describe for DistinctNode<T, K>
where
    T: Send + 'static,
    K: Hash + Eq + Send + 'static,
{
    fn descriptor(&self) -> StageDescriptor {
        StageDescriptor::new(StageKind::Distinct, "distinct")
            .label(self.label.clone())
            .param("consecutive_only", self.consecutive_only)
    }

    fn upstream(&self) -> Option<&dyn Describe> {
        Some(&self.upstream)
    }
}

impl<T, K> Stage<T> for DistinctNode<T, K>
where
    T: Send + 'static,
    K: Hash + Eq + Send + 'static,
{
    fn build(&self, builder: &ExecutionBuilder<'_>) -> Runnable<T> {
        Box::new(DistinctIter {
            upstream: builder.build(&self.upstream),
            key: self.key.clone(),
            consecutive_only: self.consecutive_only,
            seen: HashSet::new(),
            last: None,
        })
    }
}

struct DistinctIter<T, K> {
    upstream: Runnable<T>,
    key: KeyFn<T, K>,
    consecutive_only: bool,
    seen: HashSet<K>,
    last: Option<K>,
}

impl<T, K: Hash + Eq> Iterator for DistinctIter<T, K> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let value = match self.upstream.next()? {
                Ok(value) => value,
                Err(err) => return Some(Err(err)),
            };
            let key = (self.key)(&value);
            if self.consecutive_only {
                if self.last.as_ref() == Some(&key) {
                    continue;
                }
                self.last = Some(key);
            } else if !self.seen.insert(key) {
                continue;
            }
            return Some(Ok(value));
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Stream;

    #[test]
    fn test_distinct_global() {
        let out: Vec<i32> = Stream::new(vec![1, 2, 1, 3, 2, 4])
            .distinct()
            .iter()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(out, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_distinct_consecutive_only() {
        let out: Vec<i32> = Stream::new(vec![1, 1, 2, 2, 1, 3, 3])
            .distinct_by(|x| *x, true)
            .iter()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(out, vec![1, 2, 1, 3]);
    }

    #[test]
    fn test_distinct_by_key() {
        let words = vec!["apple", "avocado", "banana", "blueberry", "cherry"];
        let out: Vec<&str> = Stream::new(words)
            .distinct_by(|w| w.chars().next(), false)
            .iter()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(out, vec!["apple", "banana", "cherry"]);
    }

    #[test]
    fn test_sessions_do_not_share_seen_keys() {
        let stream = Stream::new(vec![1, 1, 2]).distinct();
        assert_eq!(stream.count().unwrap(), 2);
        assert_eq!(stream.count().unwrap(), 2);
    }
}
