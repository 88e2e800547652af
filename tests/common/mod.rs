//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use std::time::Duration;
use streamable_rs::{Result, Stream};

/// Upper bound for anything a test waits on
pub fn test_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// Iterate `stream` to the end, panicking on the first error
pub fn collect_values<T: Send + 'static>(stream: &Stream<T>) -> Vec<T> {
    stream
        .iter()
        .map(|outcome| outcome.expect("stream yielded an error"))
        .collect()
}

/// Iterate `stream` to the end, keeping errors as outcomes
pub fn collect_outcomes<T: Send + 'static>(stream: &Stream<T>) -> Vec<Result<T>> {
    stream.iter().collect()
}
