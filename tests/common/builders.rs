//! Test data builders for creating test streams

use std::time::Duration;
use streamable_rs::Stream;
use thiserror::Error;

/// Error raised by the sources built here
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("record {0} is corrupt")]
pub struct CorruptRecord(pub usize);

/// Error raised by division work functions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("division by zero")]
pub struct DivideByZero;

/// `10 / x`, failing on zero
pub fn ten_over(x: i32) -> Result<f64, DivideByZero> {
    if x == 0 {
        Err(DivideByZero)
    } else {
        Ok(10.0 / x as f64)
    }
}

/// Builder for sources yielding `0..len`, with optional failures and delays
pub struct SourceBuilder {
    len: usize,
    failing: Vec<usize>,
    delay: Option<Duration>,
}

impl SourceBuilder {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            failing: Vec::new(),
            delay: None,
        }
    }

    /// Yield `CorruptRecord(position)` instead of the value at these positions
    pub fn failing_at(mut self, positions: &[usize]) -> Self {
        self.failing.extend_from_slice(positions);
        self
    }

    /// Sleep before producing each element
    pub fn delay_per_element(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn build(self) -> Stream<usize> {
        let Self {
            len,
            failing,
            delay,
        } = self;
        Stream::try_from_fn(move || {
            let failing = failing.clone();
            (0..len).map(move |i| {
                if let Some(delay) = delay {
                    std::thread::sleep(delay);
                }
                if failing.contains(&i) {
                    Err(CorruptRecord(i))
                } else {
                    Ok(i)
                }
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_builder() {
        let outcomes: Vec<bool> = SourceBuilder::new(4)
            .failing_at(&[2])
            .build()
            .iter()
            .map(|r| r.is_ok())
            .collect();

        // The consumer iterator stops after the first uncaught error
        assert_eq!(outcomes, vec![true, true, false]);
    }
}
