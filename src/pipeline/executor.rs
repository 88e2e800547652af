//! Stream executor — the consumer-facing iterator of one iteration session.
//!
//! Each call to [`Stream::iter`](crate::Stream::iter) builds a fresh runnable
//! chain and wraps it in a [`StreamIter`]. Pulling the iterator:
//! 1. Pulls the terminal runnable, which pulls its upstream, down to the source.
//! 2. Hands values and errors to the consumer unchanged.
//! 3. On end of stream or on the first error reaching the consumer, drops the
//!    whole chain so every stage releases its pools, buffers and timers.
//!
//! Dropping a `StreamIter` early runs the same teardown.

use crate::error::{Result, StreamError};
use crate::pipeline::node::Runnable;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// Why a session stopped producing elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Exhausted,
    Failed,
}

/// Iterator over one iteration session of a stream.
pub struct StreamIter<T> {
    chain: Option<Runnable<T>>,
    session: u64,
    depth: usize,
    yielded: u64,
    state: SessionState,
    started: Instant,
}

impl<T> StreamIter<T> {
    pub(crate) fn new(chain: Runnable<T>, depth: usize) -> Self {
        let session = NEXT_SESSION.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(session, depth, "iteration started");
        Self {
            chain: Some(chain),
            session,
            depth,
            yielded: 0,
            state: SessionState::Running,
            started: Instant::now(),
        }
    }

    /// Current state of the session.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Number of values handed to the consumer so far.
    pub fn yielded(&self) -> u64 {
        self.yielded
    }

    /// Number of stages in the running chain.
    pub fn depth(&self) -> usize {
        self.depth
    }

    fn finish(&mut self, state: SessionState, error: Option<&StreamError>) {
        self.chain = None;
        self.state = state;
        match error {
            Some(err) => tracing::debug!(
                session = self.session,
                yielded = self.yielded,
                error = %err,
                "iteration failed"
            ),
            None => tracing::debug!(
                session = self.session,
                yielded = self.yielded,
                elapsed_ms = self.started.elapsed().as_millis() as u64,
                "iteration finished"
            ),
        }
    }
}

impl<T> Iterator for StreamIter<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let chain = self.chain.as_mut()?;
        match chain.next() {
            Some(Ok(value)) => {
                self.yielded += 1;
                Some(Ok(value))
            }
            Some(Err(err)) => {
                self.finish(SessionState::Failed, Some(&err));
                Some(Err(err))
            }
            None => {
                self.finish(SessionState::Exhausted, None);
                None
            }
        }
    }
}

impl<T> std::iter::FusedIterator for StreamIter<T> {}

impl<T> Drop for StreamIter<T> {
    fn drop(&mut self) {
        if self.chain.take().is_some() {
            tracing::debug!(
                session = self.session,
                yielded = self.yielded,
                "iteration cancelled"
            );
        }
    }
}

impl<T> std::fmt::Debug for StreamIter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamIter")
            .field("session", &self.session)
            .field("depth", &self.depth)
            .field("yielded", &self.yielded)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(items: Vec<Result<i32>>) -> Runnable<i32> {
        Box::new(items.into_iter())
    }

    #[test]
    fn test_exhaustion() {
        let mut iter = StreamIter::new(chain(vec![Ok(1), Ok(2)]), 1);
        assert_eq!(iter.next().unwrap().unwrap(), 1);
        assert_eq!(iter.next().unwrap().unwrap(), 2);
        assert!(iter.next().is_none());
        assert_eq!(iter.state(), SessionState::Exhausted);
        assert!(iter.next().is_none());
        assert_eq!(iter.yielded(), 2);
    }

    #[test]
    fn test_error_is_sticky() {
        let mut iter = StreamIter::new(
            chain(vec![Ok(1), Err(StreamError::Cancelled), Ok(3)]),
            1,
        );
        assert!(iter.next().unwrap().is_ok());
        assert!(iter.next().unwrap().is_err());
        assert_eq!(iter.state(), SessionState::Failed);
        assert!(iter.next().is_none());
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_sessions_are_distinct() {
        let a = StreamIter::new(chain(vec![]), 1);
        let b = StreamIter::new(chain(vec![]), 1);
        assert_ne!(a.session, b.session);
        assert_eq!(a.depth(), 1);
    }
}
