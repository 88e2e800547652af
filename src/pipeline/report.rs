//! Progress reporting for `observe` stages.
//!
//! An observe stage counts the outcomes flowing through it and hands a
//! [`ProgressReport`] to a [`ProgressReporter`] whenever its [`Cadence`] says
//! so, plus once more when the stream ends.

use crate::error::{Result, StreamError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// When an observe stage emits a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    /// Report at the 1st, 2nd, 4th, 8th, ... outcome.
    #[default]
    Logarithmic,
    /// Report every `n` outcomes.
    Every(u64),
}

impl Cadence {
    pub fn validate(&self) -> Result<()> {
        match self {
            Cadence::Every(0) => Err(StreamError::Configuration(
                "observe cadence must be at least every 1 element".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Whether the `count`-th outcome (1-based) should be reported.
    #[inline]
    pub fn is_due(&self, count: u64) -> bool {
        match *self {
            Cadence::Logarithmic => count.is_power_of_two(),
            Cadence::Every(n) => n > 0 && count % n == 0,
        }
    }
}

impl std::fmt::Display for Cadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cadence::Logarithmic => write!(f, "logarithmic"),
            Cadence::Every(n) => write!(f, "every {}", n),
        }
    }
}

/// Snapshot of an observe stage's counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressReport {
    /// User label of the observe stage
    pub label: String,
    /// Values that passed through so far
    pub yielded: u64,
    /// Errors that passed through so far
    pub errors: u64,
    /// Time since the stage was first pulled
    pub elapsed: Duration,
    /// Wall-clock start of the iteration
    pub started_at: DateTime<Utc>,
    /// Set on the report emitted at end of stream
    pub finished: bool,
}

impl ProgressReport {
    /// Values plus errors.
    pub fn total(&self) -> u64 {
        self.yielded + self.errors
    }
}

/// Receives progress reports from observe stages.
///
/// Reports may arrive from whichever thread iterates the stream.
#[cfg_attr(test, mockall::automock)]
pub trait ProgressReporter: Send + Sync {
    fn report(&self, report: &ProgressReport);
}

/// Default reporter, logs each report through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn report(&self, report: &ProgressReport) {
        tracing::info!(
            label = %report.label,
            yielded = report.yielded,
            errors = report.errors,
            elapsed_ms = report.elapsed.as_millis() as u64,
            finished = report.finished,
            "stream progress"
        );
    }
}
